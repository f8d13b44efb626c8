//! Declarative remote interfaces.
//!
//! [`remote_interface!`](crate::remote_interface) takes a list of operations
//! and generates the three pieces every object class needs: the trait a
//! local object implements, a function building its [`OperationTable`]
//! (the skeleton side) and a typed stub that marshals calls through a
//! [`Client`]. Arguments and return values are [`Marshal`] types.
//!
//! ```
//! use cxorb_orb::remote_interface;
//!
//! pub mod counter_op {
//!     pub const ADD: u32 = 0;
//!     pub const TOTAL: u32 = 1;
//! }
//!
//! remote_interface! {
//!     /// A running total.
//!     pub interface Counter("Counter") {
//!         class: 0x10;
//!         table: counter_table;
//!         stub: CounterStub;
//!
//!         fn add(delta: i32, times: u16 = 1) -> () = counter_op::ADD;
//!         fn total() -> i64 = counter_op::TOTAL;
//!     }
//! }
//!
//! assert_eq!(counter_table::<Total>().operations(), vec![0, 1]);
//! # struct Total;
//! # impl Counter for Total {
//! #     fn add(&self, _delta: i32, _times: u16) {}
//! #     fn total(&self) -> i64 { 0 }
//! # }
//! ```
//!
//! [`OperationTable`]: crate::OperationTable
//! [`Client`]: crate::Client

use cxorb_wire::{Decoder, Encoder, Result};

/// A value with a wire image, as an operation argument or return value.
pub trait Marshal: Sized {
    fn put(&self, enc: &mut Encoder<'_>) -> Result<()>;

    fn get(dec: &mut Decoder<'_>) -> Result<Self>;
}

macro_rules! impl_marshal {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Marshal for $ty {
                fn put(&self, enc: &mut Encoder<'_>) -> Result<()> {
                    enc.put(*self)
                }

                fn get(dec: &mut Decoder<'_>) -> Result<Self> {
                    dec.get()
                }
            }
        )*
    };
}

impl_marshal!(bool, u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// No payload.
impl Marshal for () {
    fn put(&self, _enc: &mut Encoder<'_>) -> Result<()> {
        Ok(())
    }

    fn get(_dec: &mut Decoder<'_>) -> Result<Self> {
        Ok(())
    }
}

/// Length-prefixed byte array.
impl Marshal for Vec<u8> {
    fn put(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.put_byte_array(self)
    }

    fn get(dec: &mut Decoder<'_>) -> Result<Self> {
        dec.get_byte_array()
    }
}

/// Decode one argument. A trailing argument with a default may be left out
/// by the caller entirely.
pub fn decode_arg<T: Marshal>(dec: &mut Decoder<'_>, default: Option<T>) -> Result<T> {
    match default {
        Some(value) if !dec.has_remaining() => Ok(value),
        _ => T::get(dec),
    }
}

#[doc(hidden)]
pub mod __private {
    pub use cxorb_transport::Stream;
    pub use std::io::{Read, Write};
}

/// Generate the trait, operation table builder and client stub of a remote
/// object class. See the [module docs](crate::interface).
#[macro_export]
macro_rules! remote_interface {
    (
        $(#[$meta:meta])*
        $vis:vis interface $name:ident ($class_name:literal) {
            class: $class:expr;
            table: $table:ident;
            stub: $stub:ident;

            $(
                $(#[$op_meta:meta])*
                fn $method:ident ( $( $arg:ident : $arg_ty:ty $(= $default:expr)? ),* $(,)? )
                    -> $ret:ty = $code:expr;
            )*
        }
    ) => {
        $(#[$meta])*
        #[allow(clippy::unused_unit)]
        $vis trait $name: Send + Sync {
            $(
                $(#[$op_meta])*
                fn $method(&self $(, $arg: $arg_ty)*) -> $ret;
            )*
        }

        #[doc = concat!("Operation table serving [`", stringify!($name), "`] objects.")]
        #[allow(unused_variables, clippy::let_unit_value)]
        $vis fn $table<T: $name + 'static>() -> $crate::OperationTable<T> {
            $crate::OperationTable::new($class_name)
                $(
                    .with($code, |object: &T, params, reply| {
                        $(
                            let $arg = $crate::interface::decode_arg::<$arg_ty>(
                                params,
                                None $( .or(Some($default)) )?,
                            )?;
                        )*
                        let value = <T as $name>::$method(object $(, $arg)*);
                        $crate::interface::Marshal::put(&value, reply)?;
                        $crate::success()
                    })
                )*
        }

        #[doc = concat!("Client-side proxy for a remote [`", stringify!($name), "`].")]
        $vis struct $stub<
            'a,
            R = $crate::interface::__private::Stream,
            W = $crate::interface::__private::Stream,
        > {
            stub: $crate::Stub<'a, R, W>,
        }

        #[allow(unused_variables, clippy::let_unit_value, clippy::unused_unit)]
        impl<'a, R, W> $stub<'a, R, W>
        where
            R: $crate::interface::__private::Read,
            W: $crate::interface::__private::Write,
        {
            pub fn new(client: &'a $crate::Client<R, W>, instance: u16) -> Self {
                Self {
                    stub: client.stub($crate::ObjectKey::new($class, instance)),
                }
            }

            pub fn target(&self) -> $crate::ObjectKey {
                self.stub.target()
            }

            $(
                $(#[$op_meta])*
                pub fn $method(&self $(, $arg: $arg_ty)*) -> $crate::Result<$ret> {
                    let mut reply = self.stub.invoke_with($code, |enc| {
                        $( $crate::interface::Marshal::put(&$arg, enc)?; )*
                        Ok(())
                    })?;
                    let value = <$ret as $crate::interface::Marshal>::get(&mut reply.decoder())?;
                    Ok(value)
                }
            )*
        }
    };
}
