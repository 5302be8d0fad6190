/// A macro which takes an Option<T> and returns None if it
/// is None, otherwise unwraps().
macro_rules! try_ret(
    ($e:expr) => (match $e { Some(e) => e, None => return None })
);

/// A macro which defines a wire enum: every variant carries a fixed
/// discriminant, and unknown discriminants are preserved losslessly.
macro_rules! wire_enum {
    (@U8
        $(#[$comment:meta])*
        $enum_name:ident { $( $enum_var:ident => $enum_val:expr ),* $(,)? }
    ) => {
        $(#[$comment])*
        #[allow(non_camel_case_types)]
        #[derive(Debug, PartialEq, Eq, Clone, Copy)]
        pub enum $enum_name {
            $( $enum_var, )*
            Unknown(u8),
        }

        impl $enum_name {
            pub fn get_u8(&self) -> u8 {
                match *self {
                    $( $enum_name::$enum_var => $enum_val, )*
                    $enum_name::Unknown(x) => x,
                }
            }
        }

        impl Codec for $enum_name {
            fn encode(&self, bytes: &mut Vec<u8>) {
                self.get_u8().encode(bytes);
            }

            fn read(r: &mut Reader) -> Option<Self> {
                Some(match try_ret!(u8::read(r)) {
                    $( $enum_val => $enum_name::$enum_var, )*
                    x => $enum_name::Unknown(x),
                })
            }
        }
    };
    (@U16
        $(#[$comment:meta])*
        $enum_name:ident { $( $enum_var:ident => $enum_val:expr ),* $(,)? }
    ) => {
        $(#[$comment])*
        #[allow(non_camel_case_types)]
        #[derive(Debug, PartialEq, Eq, Clone, Copy)]
        pub enum $enum_name {
            $( $enum_var, )*
            Unknown(u16),
        }

        impl $enum_name {
            pub fn get_u16(&self) -> u16 {
                match *self {
                    $( $enum_name::$enum_var => $enum_val, )*
                    $enum_name::Unknown(x) => x,
                }
            }
        }

        impl Codec for $enum_name {
            fn encode(&self, bytes: &mut Vec<u8>) {
                encode_u16(self.get_u16(), bytes);
            }

            fn read(r: &mut Reader) -> Option<Self> {
                Some(match try_ret!(read_u16(r)) {
                    $( $enum_val => $enum_name::$enum_var, )*
                    x => $enum_name::Unknown(x),
                })
            }
        }
    };
}
