pub mod crypto;
pub mod test_utils;

pub use crypto::{cipher_from_config, AesGcmCipher, CryptoError, DisabledCipher, FieldCipher};
