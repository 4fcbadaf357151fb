//! Upstream quote sources, one per asset type.

pub mod altinkaynak;
pub mod http;
pub mod isyatirim;
pub mod tcmb;
pub mod tefas;
pub mod xml;

pub use altinkaynak::{AltinkaynakProvider, Credentials};
pub use http::{HttpTransport, ReqwestTransport};
pub use isyatirim::IsYatirimProvider;
pub use tcmb::TcmbProvider;
pub use tefas::TefasProvider;
