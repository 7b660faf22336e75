//! 评分权重
//!
//! 日程编排与普通推荐使用两套权重：角色、同义词、级别、类型加分相同，兴趣匹配的权重不同。

use serde::Serialize;

/// 一套加分权重；所有项都是累加的
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoringProfile {
    pub name: &'static str,
    pub role_in_tags: f64,
    pub role_in_title: f64,
    pub role_in_description: f64,
    /// 每个命中的角色同义词
    pub role_synonym: f64,
    pub interest_in_title: f64,
    pub interest_in_tags: f64,
    pub interest_in_services: f64,
    pub interest_in_description: f64,
    pub interest_in_type: f64,
    /// 每个命中的主题同义词
    pub interest_synonym: f64,
    pub level_match: f64,
    pub keynote_bonus: f64,
    pub workshop_bonus: f64,
    pub breakout_bonus: f64,
}

impl ScoringProfile {
    /// 个性化日程编排
    pub const SCHEDULE: ScoringProfile = ScoringProfile {
        name: "schedule",
        role_in_tags: 10.0,
        role_in_title: 6.0,
        role_in_description: 4.0,
        role_synonym: 5.0,
        interest_in_title: 8.0,
        interest_in_tags: 6.0,
        interest_in_services: 4.0,
        interest_in_description: 3.0,
        interest_in_type: 2.0,
        interest_synonym: 3.0,
        level_match: 5.0,
        keynote_bonus: 3.0,
        workshop_bonus: 2.0,
        breakout_bonus: 1.0,
    };

    /// 会话推荐（兴趣权重较轻）
    pub const RECOMMEND: ScoringProfile = ScoringProfile {
        name: "recommend",
        interest_in_title: 4.0,
        interest_in_tags: 3.0,
        interest_in_services: 2.0,
        interest_in_description: 2.0,
        interest_in_type: 1.0,
        ..ScoringProfile::SCHEDULE
    };
}
