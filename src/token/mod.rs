mod hs512;

pub use hs512::{Claims, Error, Header, TOKEN_ISSUER, TOKEN_TTL_SECONDS, sign_hs512, verify_hs512};
