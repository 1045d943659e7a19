use crate::detect::engine::AnomalyEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: AnomalyEngine,
}
