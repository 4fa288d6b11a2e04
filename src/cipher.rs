//! Account-bound credential protection.
//!
//! The client keeps its cached login token encrypted with the OS data
//! protection facility for the current user, using the account name as
//! additional entropy. A blob produced for one account cannot be opened with
//! another account's name, nor by a different OS user.

use crate::error::{Error, Result};
use std::sync::Arc;

/// Current-user scoped encryption with caller-supplied entropy.
///
/// # Security Requirements
///
/// - Ciphertext MUST only be recoverable by the OS user that produced it.
/// - `entropy` MUST be required again to decrypt.
pub trait CredentialProtector: Send + Sync {
    /// Encrypt `plaintext`, binding it to `entropy`.
    fn protect(&self, plaintext: &[u8], entropy: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt a blob produced by [`protect`](Self::protect) with the same entropy.
    fn unprotect(&self, ciphertext: &[u8], entropy: &[u8]) -> Result<Vec<u8>>;
}

/// Encrypt a token for `account_name` and render it as lowercase hex.
pub fn bind(protector: &dyn CredentialProtector, token: &str, account_name: &str) -> Result<String> {
    let sealed = protector.protect(token.as_bytes(), account_name.as_bytes())?;
    if sealed.is_empty() {
        return Err(Error::keystore("protection produced no output"));
    }
    Ok(hex::encode(sealed))
}

/// Decrypt a hex blob produced by [`bind`].
pub fn unbind(protector: &dyn CredentialProtector, cipher_hex: &str, account_name: &str) -> Result<String> {
    let sealed = hex::decode(cipher_hex)
        .map_err(|e| Error::invalid_input(format!("ciphertext is not hex: {}", e)))?;
    let plain = protector.unprotect(&sealed, account_name.as_bytes())?;
    String::from_utf8(plain).map_err(|_| Error::keystore("decrypted token is not UTF-8"))
}

/// Protector for the current platform.
pub fn native_protector() -> Arc<dyn CredentialProtector> {
    #[cfg(windows)]
    {
        Arc::new(dpapi::DpapiProtector)
    }
    #[cfg(not(windows))]
    {
        Arc::new(UnavailableProtector)
    }
}

/// Protector for platforms without a compatible data protection facility.
#[cfg(not(windows))]
pub struct UnavailableProtector;

#[cfg(not(windows))]
impl CredentialProtector for UnavailableProtector {
    fn protect(&self, _plaintext: &[u8], _entropy: &[u8]) -> Result<Vec<u8>> {
        Err(Error::keystore(
            "the client's data protection API is only available on Windows",
        ))
    }

    fn unprotect(&self, _ciphertext: &[u8], _entropy: &[u8]) -> Result<Vec<u8>> {
        Err(Error::keystore(
            "the client's data protection API is only available on Windows",
        ))
    }
}

#[cfg(windows)]
pub use dpapi::DpapiProtector;

#[cfg(windows)]
mod dpapi {
    use super::CredentialProtector;
    use crate::error::{Error, Result};
    use windows_sys::Win32::Foundation::LocalFree;
    use windows_sys::Win32::Security::Cryptography::{
        CryptProtectData, CryptUnprotectData, CRYPTPROTECT_UI_FORBIDDEN, CRYPT_INTEGER_BLOB,
    };

    /// Windows DPAPI in current-user scope.
    pub struct DpapiProtector;

    fn blob(data: &[u8]) -> CRYPT_INTEGER_BLOB {
        CRYPT_INTEGER_BLOB {
            cbData: data.len() as u32,
            pbData: data.as_ptr() as *mut u8,
        }
    }

    /// Copy an output blob into a Vec and release the OS allocation.
    unsafe fn take(out: CRYPT_INTEGER_BLOB) -> Vec<u8> {
        let bytes = std::slice::from_raw_parts(out.pbData, out.cbData as usize).to_vec();
        LocalFree(out.pbData as _);
        bytes
    }

    impl CredentialProtector for DpapiProtector {
        fn protect(&self, plaintext: &[u8], entropy: &[u8]) -> Result<Vec<u8>> {
            let input = blob(plaintext);
            let entropy = blob(entropy);
            let mut out = CRYPT_INTEGER_BLOB {
                cbData: 0,
                pbData: std::ptr::null_mut(),
            };

            let ok = unsafe {
                CryptProtectData(
                    &input,
                    std::ptr::null(),
                    &entropy,
                    std::ptr::null(),
                    std::ptr::null(),
                    CRYPTPROTECT_UI_FORBIDDEN,
                    &mut out,
                )
            };
            if ok == 0 {
                return Err(Error::keystore(format!(
                    "CryptProtectData failed: {}",
                    std::io::Error::last_os_error()
                )));
            }
            Ok(unsafe { take(out) })
        }

        fn unprotect(&self, ciphertext: &[u8], entropy: &[u8]) -> Result<Vec<u8>> {
            let input = blob(ciphertext);
            let entropy = blob(entropy);
            let mut out = CRYPT_INTEGER_BLOB {
                cbData: 0,
                pbData: std::ptr::null_mut(),
            };

            let ok = unsafe {
                CryptUnprotectData(
                    &input,
                    std::ptr::null_mut(),
                    &entropy,
                    std::ptr::null(),
                    std::ptr::null(),
                    CRYPTPROTECT_UI_FORBIDDEN,
                    &mut out,
                )
            };
            if ok == 0 {
                return Err(Error::keystore(format!(
                    "CryptUnprotectData failed: {}",
                    std::io::Error::last_os_error()
                )));
            }
            Ok(unsafe { take(out) })
        }
    }

}

/// Deterministic protector for tests.
///
/// **FOR TESTING ONLY**: XORs data with a SHA-256 keystream derived from a
/// fixed key and the entropy, and appends a short tag so the wrong entropy
/// is detected on open.
#[cfg(test)]
pub(crate) struct TestProtector;

#[cfg(test)]
impl TestProtector {
    const KEY: &'static [u8] = b"cachelogin-test-key";
    const TAG_LEN: usize = 4;

    fn keystream(entropy: &[u8], len: usize) -> Vec<u8> {
        use sha2::{Digest, Sha256};

        let mut out = Vec::with_capacity(len);
        let mut counter = 0u32;
        while out.len() < len {
            let mut hasher = Sha256::new();
            hasher.update(Self::KEY);
            hasher.update(entropy);
            hasher.update(counter.to_le_bytes());
            out.extend_from_slice(&hasher.finalize());
            counter += 1;
        }
        out.truncate(len);
        out
    }

    fn tag(entropy: &[u8], plaintext: &[u8]) -> Vec<u8> {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(entropy);
        hasher.update(plaintext);
        hasher.finalize()[..Self::TAG_LEN].to_vec()
    }
}

#[cfg(test)]
impl CredentialProtector for TestProtector {
    fn protect(&self, plaintext: &[u8], entropy: &[u8]) -> Result<Vec<u8>> {
        let stream = Self::keystream(entropy, plaintext.len());
        let mut out: Vec<u8> = plaintext.iter().zip(&stream).map(|(p, k)| p ^ k).collect();
        out.extend(Self::tag(entropy, plaintext));
        Ok(out)
    }

    fn unprotect(&self, ciphertext: &[u8], entropy: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < Self::TAG_LEN {
            return Err(Error::keystore("ciphertext too short"));
        }
        let (body, tag) = ciphertext.split_at(ciphertext.len() - Self::TAG_LEN);
        let stream = Self::keystream(entropy, body.len());
        let plain: Vec<u8> = body.iter().zip(&stream).map(|(c, k)| c ^ k).collect();
        if Self::tag(entropy, &plain) != tag {
            return Err(Error::keystore("entropy mismatch"));
        }
        Ok(plain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_is_lowercase_hex() {
        let hex = bind(&TestProtector, "eyJ.eyJ.sig", "alice").unwrap();
        assert!(!hex.is_empty());
        assert_eq!(hex.len() % 2, 0);
        assert!(hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_bind_unbind_round_trip() {
        let hex = bind(&TestProtector, "eyJ.eyJ.sig", "alice").unwrap();
        assert_eq!(unbind(&TestProtector, &hex, "alice").unwrap(), "eyJ.eyJ.sig");
    }

    #[test]
    fn test_bound_to_account() {
        let hex = bind(&TestProtector, "eyJ.eyJ.sig", "alice").unwrap();
        let err = unbind(&TestProtector, &hex, "bob").unwrap_err();
        assert!(matches!(err, Error::Keystore(_)));
    }

    #[test]
    fn test_unbind_rejects_non_hex() {
        assert!(matches!(
            unbind(&TestProtector, "zz", "alice"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_native_protector_fails_explicitly() {
        let err = bind(native_protector().as_ref(), "t", "alice").unwrap_err();
        assert!(matches!(err, Error::Keystore(_)));
    }
}
