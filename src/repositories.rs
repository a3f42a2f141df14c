pub(crate) mod challenges;
pub(crate) mod health;
pub(crate) mod leaderboard;
pub(crate) mod profiles;
pub(crate) mod reviews;
pub(crate) mod submissions;
