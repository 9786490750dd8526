#![doc = include_str!("../README.md")]

pub mod model {
    pub use facadex_model::*;
}

pub mod common {
    pub use facadex_common::*;
}

pub mod storage {
    pub use facadex_storage::*;
}

pub mod engine {
    pub use facadex_engine::*;
}
