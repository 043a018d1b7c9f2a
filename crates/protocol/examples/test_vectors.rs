//! Generate test vectors for server-side interop testing.
//!
//! Run with: cargo run --package protocol --example test_vectors
//!
//! Prints canonical envelope texts and their ciphertexts for a fixed key
//! pair as JavaScript constants, so server implementations in other
//! languages can check their JSON shapes and envelope cipher against
//! known-good output. The cipher derives its IV from the public key, so
//! every vector is deterministic.

use protocol::{
    CommandRequest, EnvelopeCipher, CHANNEL_JOIN_COMMAND, FIRST_COMMAND_INDEX, KEY_AUTH_COMMAND,
    PRIVATE_AUTH_COMMAND,
};
use serde_json::json;

const PUBLIC_KEY: &str = "rack-7";
const PRIVATE_KEY: &str = "super-secret";

fn main() {
    // Test vector 1: first handshake step
    let key_auth = CommandRequest::new(
        KEY_AUTH_COMMAND,
        FIRST_COMMAND_INDEX,
        json!({"key": PUBLIC_KEY}),
    );
    print_test_vector("key_auth", &key_auth.to_json().unwrap());

    // Test vector 2: second handshake step with an encrypted challenge
    let cipher = EnvelopeCipher::new(PUBLIC_KEY, PRIVATE_KEY);
    let private_auth = CommandRequest::new(
        PRIVATE_AUTH_COMMAND,
        FIRST_COMMAND_INDEX + 1,
        json!({"verify": cipher.encrypt("challenge-1")}),
    );
    print_test_vector("private_auth", &private_auth.to_json().unwrap());

    // Test vector 3: channel join
    let join = CommandRequest::new(
        CHANNEL_JOIN_COMMAND,
        FIRST_COMMAND_INDEX + 2,
        json!({"channel": "news"}),
    );
    print_test_vector("channel_join", &join.to_json().unwrap());

    // Test vector 4: correlated replies
    let success = json!({
        "index": FIRST_COMMAND_INDEX,
        "result": "success",
        "resultData": {"cipher": true, "verify": "challenge-1"},
    });
    print_test_vector("success_reply", &success.to_string());

    let error = json!({
        "index": FIRST_COMMAND_INDEX + 2,
        "result": "error",
        "resultData": {"message": "access denied", "code": 403},
    });
    print_test_vector("error_reply", &error.to_string());

    // Test vector 5: channel broadcast
    let broadcast = json!({
        "command": "broadcast",
        "target": "news",
        "note": "welcome",
    });
    print_test_vector("broadcast", &broadcast.to_string());

    // Test vector 6: a whole envelope as ciphertext
    let request = CommandRequest::new("echo", FIRST_COMMAND_INDEX + 3, json!({"msg": "hi"}));
    let plaintext = request.to_json().unwrap();
    print_test_vector("cipher_plaintext", &plaintext);
    print_test_vector("cipher_frame", &cipher.encrypt(&plaintext));
}

fn print_test_vector(name: &str, text: &str) {
    // A JSON string literal is also a valid JavaScript string literal.
    println!(
        "export const {} = {};",
        name,
        serde_json::to_string(text).expect("string encoding failed")
    );
}
