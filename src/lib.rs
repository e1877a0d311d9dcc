pub mod alias;
pub mod assemble;
pub mod batch;
pub mod config;
pub mod dom;
pub mod error;
pub mod http_client;
pub mod league;
pub mod locator;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod objects;
pub mod observe;
pub mod persist;
pub mod pipeline;
pub mod reconcile;
pub mod scan;

pub use error::ExtractError;
pub use model::{MatchMethod, RawDocument, RosterEntry, Standings, TeamRecord};
