use std::sync::Arc;

use crate::supabase::{AuthProvider, MemoryBackend, ProfileStore, SupabaseHttpClient, TaskStore};

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<dyn AuthProvider>,
    pub profiles: Arc<dyn ProfileStore>,
    pub tasks: Arc<dyn TaskStore>,
}

impl AppState {
    pub fn supabase(client: SupabaseHttpClient) -> Self {
        let client = Arc::new(client);
        Self {
            auth: client.clone(),
            profiles: client.clone(),
            tasks: client,
        }
    }

    pub fn memory(backend: Arc<MemoryBackend>) -> Self {
        Self {
            auth: backend.clone(),
            profiles: backend.clone(),
            tasks: backend,
        }
    }
}
