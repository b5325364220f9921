// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod demo;
pub mod derived;
pub mod edit;
pub mod ids;
pub mod model;
pub mod reference;
pub mod state;
pub mod store;

pub use demo::*;
pub use derived::*;
pub use edit::*;
pub use ids::*;
pub use model::*;
pub use reference::*;
pub use state::*;
pub use store::*;
