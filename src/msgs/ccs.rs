use crate::msgs::codec::{Codec, Reader};

#[derive(Debug, Clone)]
pub struct ChangeCipherSpecPayload;

impl Codec for ChangeCipherSpecPayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        1u8.encode(bytes);
    }

    fn read(r: &mut Reader) -> Option<ChangeCipherSpecPayload> {
        let typ = try_ret!(u8::read(r));

        if typ == 1 && !r.any_left() {
            Some(ChangeCipherSpecPayload {})
        } else {
            None
        }
    }
}

impl ChangeCipherSpecPayload {
    pub fn len(&self) -> usize {
        1
    }
}
