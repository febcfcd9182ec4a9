#![no_main]

use libfuzzer_sys::fuzz_target;
use lobby_session_client::{JwtUsernameDecoder, TokenDecoder};

fuzz_target!(|data: &[u8]| {
    if let Ok(token) = std::str::from_utf8(data) {
        let _ = JwtUsernameDecoder.username(token);
    }
});
