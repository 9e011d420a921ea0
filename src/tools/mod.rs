pub mod logo;
pub mod qr;
pub mod scan;
pub mod session;
