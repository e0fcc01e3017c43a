//! ABD Rebuild Helper Common Library
//!
//! 名簿 CSV と KMZ ポイントの照合エンジン（CLI から使用）

pub mod types;
pub mod error;
pub mod normalizer;
pub mod roster;
pub mod kml;
pub mod kmz;
pub mod matcher;
pub mod bulk;
pub mod mutator;
pub mod filter;
pub mod session;
pub mod report;

pub use types::{AddedPoint, Coordinate, GeoPoint, MatchReason, MatchResult, MatchStatus, Row};
pub use error::{Error, Result};
pub use normalizer::{normalize, normalize_house_number};
pub use roster::{parse_roster, Roster};
pub use kml::{KmlDocument, NodeId};
pub use kmz::{read_kmz, write_kmz, KmzContents};
pub use matcher::{auto_match, MatchSummary, PointIndex};
pub use bulk::BulkQueue;
pub use mutator::{ExportStrategy, KmlMutator, MutationStats, MutatorOptions};
pub use filter::{RowFilter, View};
pub use session::{BulkOutcome, ExportArtifact, LoadSummary, PlaceOutcome, Session, SessionOptions};
pub use report::{build_report_rows, MatchReport, ReportRow};
