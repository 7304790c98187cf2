// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod error;
pub mod ids;
pub mod model;
pub mod services;
pub mod session;
pub mod state;

pub use error::*;
pub use ids::*;
pub use model::*;
pub use services::*;
pub use session::*;
pub use state::*;
