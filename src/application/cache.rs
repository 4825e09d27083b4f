use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

/// IDキーのリードスルーキャッシュ
///
/// アノテーション駆動の暗黙的なキャッシュ介在を、明示的な
/// `get` / `put` / `invalidate` の3操作に置き換えたもの。書き込み経路での
/// キャッシュ更新・無効化は、呼び出し側（ディレクトリ層）に見える副作用
/// として現れる。
///
/// 貸出エンジンの可用性チェックはこのキャッシュを経由しない。
#[derive(Debug)]
pub struct EntityCache<K, V> {
    entries: Mutex<HashMap<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> EntityCache<K, V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// キャッシュからの取得。ヒットした値のクローンを返す
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    /// 値の登録・上書き（作成・更新・読み込み時に呼ぶ）
    pub fn put(&self, key: K, value: V) {
        self.entries.lock().unwrap().insert(key, value);
    }

    /// 無効化（削除時に呼ぶ）
    pub fn invalidate(&self, key: &K) {
        self.entries.lock().unwrap().remove(key);
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for EntityCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_returns_none_on_miss() {
        let cache: EntityCache<i32, String> = EntityCache::new();
        assert_eq!(cache.get(&1), None);
    }

    #[test]
    fn test_put_then_get() {
        let cache = EntityCache::new();
        cache.put(1, "alpha".to_string());
        assert_eq!(cache.get(&1), Some("alpha".to_string()));
    }

    #[test]
    fn test_put_overwrites_existing_entry() {
        let cache = EntityCache::new();
        cache.put(1, "alpha".to_string());
        cache.put(1, "beta".to_string());
        assert_eq!(cache.get(&1), Some("beta".to_string()));
    }

    #[test]
    fn test_invalidate_removes_entry() {
        let cache = EntityCache::new();
        cache.put(1, "alpha".to_string());
        cache.invalidate(&1);
        assert_eq!(cache.get(&1), None);
    }
}
