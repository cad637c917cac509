use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::PayloadError;

/// A fixed-layout, little-endian message carried in a frame payload.
///
/// Implementors read and write exactly [`WireMessage::WIRE_SIZE`] bytes.
/// Decoders may reject content (an out-of-range instance index, say) by
/// returning a [`PayloadError`].
pub trait WireMessage: Sized {
    /// Encoded size in bytes.
    const WIRE_SIZE: usize;

    /// Read one message from `src`.
    ///
    /// `src` holds at least [`WireMessage::WIRE_SIZE`] bytes; use
    /// [`WireMessage::from_payload`] for untrusted input.
    fn decode<B: Buf>(src: &mut B) -> Result<Self, PayloadError>;

    /// Append the encoded message to `dst`.
    fn encode<B: BufMut>(&self, dst: &mut B);

    /// Decode a whole payload, rejecting any length other than `WIRE_SIZE`.
    fn from_payload(payload: &[u8]) -> Result<Self, PayloadError> {
        if payload.len() != Self::WIRE_SIZE {
            return Err(PayloadError::Length {
                expected: Self::WIRE_SIZE,
                actual: payload.len(),
            });
        }
        let mut src = payload;
        Self::decode(&mut src)
    }

    /// Encode into a fresh payload buffer.
    fn to_payload(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(Self::WIRE_SIZE);
        self.encode(&mut dst);
        dst.freeze()
    }
}

/// Arrays of messages are laid out back to back, as the firmware sends
/// per-instance tables (feedback for every motor, say).
impl<T: WireMessage, const N: usize> WireMessage for [T; N] {
    const WIRE_SIZE: usize = T::WIRE_SIZE * N;

    fn decode<B: Buf>(src: &mut B) -> Result<Self, PayloadError> {
        let items = (0..N)
            .map(|_| T::decode(src))
            .collect::<Result<Vec<_>, _>>()?;
        let actual = items.len();
        items.try_into().map_err(|_| PayloadError::Length {
            expected: N,
            actual,
        })
    }

    fn encode<B: BufMut>(&self, dst: &mut B) {
        for item in self {
            item.encode(dst);
        }
    }
}

macro_rules! scalar_message {
    ($($ty:ty => $get:ident, $put:ident;)*) => {
        $(
            impl WireMessage for $ty {
                const WIRE_SIZE: usize = std::mem::size_of::<$ty>();

                fn decode<B: Buf>(src: &mut B) -> Result<Self, PayloadError> {
                    Ok(src.$get())
                }

                fn encode<B: BufMut>(&self, dst: &mut B) {
                    dst.$put(*self);
                }
            }
        )*
    };
}

scalar_message! {
    u8 => get_u8, put_u8;
    i8 => get_i8, put_i8;
    u16 => get_u16_le, put_u16_le;
    i16 => get_i16_le, put_i16_le;
    u32 => get_u32_le, put_u32_le;
    i32 => get_i32_le, put_i32_le;
    f32 => get_f32_le, put_f32_le;
}
