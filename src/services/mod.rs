pub mod engine;
pub mod kakao;
