//! Self-signed identities generated at test time.

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::symm::Cipher;
use openssl::x509::{X509Builder, X509NameBuilder, X509};

pub(crate) struct TestIdentity {
    pub key: PKey<Private>,
    pub certificate: X509,
}

impl TestIdentity {
    pub fn generate(common_name: &str) -> Self {
        let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();

        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("CN", common_name).unwrap();
        let name = name.build();

        let mut builder = X509Builder::new().unwrap();
        builder.set_version(2).unwrap();
        let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
        builder.set_serial_number(&serial).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder
            .set_not_before(&Asn1Time::days_from_now(0).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::days_from_now(30).unwrap())
            .unwrap();
        builder.sign(&key, MessageDigest::sha256()).unwrap();

        Self {
            key,
            certificate: builder.build(),
        }
    }

    pub fn pkcs12(&self, password: &str) -> Vec<u8> {
        Pkcs12::builder()
            .name("test")
            .pkey(&self.key)
            .cert(&self.certificate)
            .build2(password)
            .unwrap()
            .to_der()
            .unwrap()
    }

    pub fn encrypted_pem(&self, password: &str) -> Vec<u8> {
        let mut pem = self
            .key
            .private_key_to_pem_pkcs8_passphrase(Cipher::aes_256_cbc(), password.as_bytes())
            .unwrap();
        pem.extend(self.certificate.to_pem().unwrap());
        pem
    }
}
