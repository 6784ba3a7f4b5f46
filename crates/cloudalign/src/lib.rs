#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use cloudalign_icp as icp;

#[doc(inline)]
pub use cloudalign_linalg as linalg;
