use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type ContextMap = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// 以型別為鍵的模組上下文，複製後共享同一份資料
#[derive(Clone, Default)]
pub struct ModuleContext {
    inner: Arc<RwLock<ContextMap>>,
}

impl ModuleContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 設定值，同型別的舊值會被取代
    pub fn set<T: Any + Send + Sync>(&self, value: T) {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.insert(TypeId::of::<T>(), Arc::new(value));
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        map.get(&TypeId::of::<T>())
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        map.contains_key(&TypeId::of::<T>())
    }
}

impl std::fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.inner.read().map(|map| map.len()).unwrap_or(0);
        f.debug_struct("ModuleContext").field("entries", &len).finish()
    }
}
