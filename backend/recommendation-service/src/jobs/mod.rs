// ============================================
// Background Jobs Module
// ============================================
//
// Contains background job runners for:
// 1. Model refresh (content similarity index + latent model)
//
// The refresh can be triggered:
// - on a fixed interval by RefreshScheduler
// - lazily by the engine on the first request that needs a model
// - directly via ModelRefresher::refresh_all

pub mod model_refresh;

pub use model_refresh::{ModelRefresher, RefreshReport, RefreshScheduler};
