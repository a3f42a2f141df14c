pub(crate) mod ai_review;
pub(crate) mod auth;
pub(crate) mod challenges;
pub(crate) mod errors;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod leaderboard;
pub(crate) mod router;
pub(crate) mod submissions;
pub(crate) mod uploads;
pub(crate) mod users;
pub(crate) mod validation;
pub(crate) mod video;
