use findmy_crypto::envelope::seal;
use findmy_crypto::{
    decrypt_cache_with_key, AeadError, CacheDecryptor, Classification, KeyGroup, KeyRing,
    PipelineError, SymmetricKey, KEY_LEN, NONCE_LEN,
};

fn key(byte: u8) -> SymmetricKey {
    SymmetricKey::from_bytes(&[byte; KEY_LEN]).unwrap()
}

/// Binary plist cache container wrapping the given envelope bytes.
fn cache_container(envelope: &[u8]) -> Vec<u8> {
    let mut root = plist::Dictionary::new();
    root.insert(
        "encryptedData".to_string(),
        plist::Value::Data(envelope.to_vec()),
    );
    let mut bytes = Vec::new();
    plist::Value::Dictionary(root)
        .to_writer_binary(&mut bytes)
        .unwrap();
    bytes
}

fn decryptor_with(group: KeyGroup, key: SymmetricKey) -> CacheDecryptor {
    let mut keys = KeyRing::new();
    keys.install(group, key).unwrap();
    CacheDecryptor::new(keys)
}

#[test]
fn bplist_prefixed_plaintext_never_classifies_as_plain_bytes() {
    // key = 32 bytes of 0x01, nonce = 12 zero bytes, plaintext = b"bplist00test".
    let key = key(0x01);
    let envelope = seal(b"bplist00test", &key, &[0u8; NONCE_LEN]).unwrap();
    let container = cache_container(&envelope);

    let decryptor = decryptor_with(KeyGroup::Fmip, key);
    let result = decryptor.decrypt_cache(&container, KeyGroup::Fmip).unwrap();

    assert_eq!(result.plaintext, b"bplist00test");
    // The truncated trailer cannot decode, so this demotes to UnparsedBytes;
    // the magic prefix rules out PlainBytes either way.
    assert!(matches!(
        result.classified,
        Classification::NestedContainer(_) | Classification::UnparsedBytes { .. }
    ));
    assert!(!matches!(result.classified, Classification::PlainBytes));
}

#[test]
fn nested_plist_plaintext_round_trips_through_the_pipeline() {
    let mut inner = plist::Dictionary::new();
    inner.insert("owner".to_string(), plist::Value::String("me@example.com".into()));
    let inner = plist::Value::Dictionary(inner);

    let mut plaintext = Vec::new();
    inner.to_writer_binary(&mut plaintext).unwrap();

    let key = key(0x33);
    let envelope = seal(&plaintext, &key, &[1u8; NONCE_LEN]).unwrap();
    let result = decrypt_cache_with_key(&cache_container(&envelope), &key).unwrap();

    assert_eq!(result.plaintext, plaintext);
    match result.classified {
        Classification::NestedContainer(value) => assert_eq!(value, inner),
        other => panic!("expected NestedContainer, got {other:?}"),
    }
}

#[test]
fn json_plaintext_classifies_as_json() {
    let key = key(0x33);
    let envelope = seal(br#"{"friends":[]}"#, &key, &[1u8; NONCE_LEN]).unwrap();
    let result = decrypt_cache_with_key(&cache_container(&envelope), &key).unwrap();
    assert!(matches!(result.classified, Classification::JsonText(_)));
}

#[test]
fn container_that_is_not_a_plist_fails_decode() {
    let err = decrypt_cache_with_key(b"definitely not a plist", &key(1)).unwrap_err();
    assert!(matches!(err, PipelineError::ContainerDecodeFailed(_)));
}

#[test]
fn container_without_encrypted_data_is_missing_envelope() {
    let mut root = plist::Dictionary::new();
    root.insert("other".to_string(), plist::Value::Boolean(true));
    let mut bytes = Vec::new();
    plist::Value::Dictionary(root)
        .to_writer_binary(&mut bytes)
        .unwrap();

    assert_eq!(
        decrypt_cache_with_key(&bytes, &key(1)).unwrap_err(),
        PipelineError::MissingEnvelope
    );
}

#[test]
fn empty_or_mistyped_encrypted_data_is_missing_envelope() {
    assert_eq!(
        decrypt_cache_with_key(&cache_container(b""), &key(1)).unwrap_err(),
        PipelineError::MissingEnvelope
    );

    let mut root = plist::Dictionary::new();
    root.insert(
        "encryptedData".to_string(),
        plist::Value::String("not bytes".into()),
    );
    let mut bytes = Vec::new();
    plist::Value::Dictionary(root)
        .to_writer_binary(&mut bytes)
        .unwrap();
    assert_eq!(
        decrypt_cache_with_key(&bytes, &key(1)).unwrap_err(),
        PipelineError::MissingEnvelope
    );
}

#[test]
fn envelope_shorter_than_minimum_is_malformed_never_a_crash() {
    let container = cache_container(&[0u8; 10]);
    assert_eq!(
        decrypt_cache_with_key(&container, &key(1)).unwrap_err(),
        PipelineError::DecryptionFailed(AeadError::Malformed)
    );
}

#[test]
fn missing_group_key_is_reported_before_touching_the_container() {
    let decryptor = decryptor_with(KeyGroup::Fmip, key(1));
    let err = decryptor
        .decrypt_cache(b"irrelevant", KeyGroup::Fmf)
        .unwrap_err();
    assert_eq!(err, PipelineError::KeyUnavailable(KeyGroup::Fmf));
}

#[test]
fn wrong_group_key_fails_authentication_rather_than_yielding_plaintext() {
    let fmip_key = key(0x01);
    let envelope = seal(b"bplist00", &fmip_key, &[0u8; NONCE_LEN]).unwrap();
    let container = cache_container(&envelope);

    // Caller mislabels the file: the FMF slot holds a different key.
    let decryptor = decryptor_with(KeyGroup::Fmf, key(0x02));
    assert_eq!(
        decryptor.decrypt_cache(&container, KeyGroup::Fmf).unwrap_err(),
        PipelineError::DecryptionFailed(AeadError::AuthenticationFailed)
    );
}

#[test]
fn one_bad_file_does_not_poison_the_decryptor() {
    let key = key(0x10);
    let decryptor = decryptor_with(KeyGroup::Fmip, key.clone());

    let good = cache_container(&seal(b"payload", &key, &[0u8; NONCE_LEN]).unwrap());
    let mut tampered_envelope = seal(b"payload", &key, &[0u8; NONCE_LEN]).unwrap();
    *tampered_envelope.last_mut().unwrap() ^= 0x80;
    let bad = cache_container(&tampered_envelope);

    assert!(decryptor.decrypt_cache(&bad, KeyGroup::Fmip).is_err());
    assert!(decryptor.decrypt_cache(&good, KeyGroup::Fmip).is_ok());
}
