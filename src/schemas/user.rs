use serde::{Deserialize, Serialize};

use crate::core::time::format_primitive;
use crate::db::models::{LeaderboardEntry, Profile};

#[derive(Debug, Serialize)]
pub(crate) struct UserResponse {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) is_admin: bool,
    pub(crate) is_active: bool,
    pub(crate) total_points: i32,
    pub(crate) submissions_count: i32,
    pub(crate) reviews_count: i32,
    pub(crate) created_at: String,
}

impl UserResponse {
    pub(crate) fn from_db(profile: Profile) -> Self {
        Self {
            id: profile.id,
            username: profile.username,
            email: profile.email,
            is_admin: profile.is_admin,
            is_active: profile.is_active,
            total_points: profile.total_points,
            submissions_count: profile.submissions_count,
            reviews_count: profile.reviews_count,
            created_at: format_primitive(profile.created_at),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AdminUserUpdate {
    #[serde(default)]
    #[serde(alias = "isAdmin")]
    pub(crate) is_admin: Option<bool>,
    #[serde(default)]
    #[serde(alias = "isActive")]
    pub(crate) is_active: Option<bool>,
    #[serde(default)]
    pub(crate) password: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LeaderboardEntryResponse {
    pub(crate) rank: i64,
    pub(crate) user_id: String,
    pub(crate) username: String,
    pub(crate) total_points: i32,
    pub(crate) submissions_count: i32,
    pub(crate) reviews_count: i32,
}

impl LeaderboardEntryResponse {
    pub(crate) fn from_db(entry: LeaderboardEntry) -> Self {
        Self {
            rank: entry.rank,
            user_id: entry.id,
            username: entry.username,
            total_points: entry.total_points,
            submissions_count: entry.submissions_count,
            reviews_count: entry.reviews_count,
        }
    }
}
