//! 相关度评分：权重配置、同义词表、评分函数

pub mod profile;
pub mod scorer;
pub mod synonyms;

pub use profile::ScoringProfile;
pub use scorer::{fallback_score, type_bonus, Preferences, RelevanceScorer, ScoredEvent};
pub use synonyms::{SynonymTable, Synonyms};
