pub(crate) mod actions;
pub(crate) mod ai_review;
pub(crate) mod reconcile;
pub(crate) mod video;
