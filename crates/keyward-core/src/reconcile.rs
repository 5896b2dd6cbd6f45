//! Merges configured and loaded keys into the list shown to the user.

use crate::keys::{ConfiguredKey, DisplayedKey, KeyId, LoadedKey};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Builds the display list for the given configured and loaded keys.
///
/// Every loaded key yields one entry, and every configured key that no loaded
/// key matched yields one more. The result is sorted by name, blob and id, so
/// it depends only on the contents of the inputs and never on their order.
///
/// Configured ids are expected to be unique.
pub fn reconcile(configured: &[ConfiguredKey], loaded: &[LoadedKey]) -> Vec<DisplayedKey> {
    let index: HashMap<&KeyId, &ConfiguredKey> =
        configured.iter().map(|key| (&key.id, key)).collect();

    // A configured key is matched by at most one loaded key. When several
    // claim it, the smallest (blob, type) wins.
    let mut claims: HashMap<&KeyId, usize> = HashMap::new();
    for (pos, key) in loaded.iter().enumerate() {
        let Some(id) = key.id.as_ref().filter(|id| index.contains_key(id)) else {
            continue;
        };
        claims
            .entry(id)
            .and_modify(|current| {
                let held = &loaded[*current];
                if (&key.blob, &key.key_type) < (&held.blob, &held.key_type) {
                    *current = pos;
                }
            })
            .or_insert(pos);
    }

    let mut result = Vec::with_capacity(loaded.len() + configured.len());

    for (pos, key) in loaded.iter().enumerate() {
        let matched = key
            .id
            .as_ref()
            .filter(|id| claims.get(id) == Some(&pos))
            .and_then(|id| index.get(id).copied());
        result.push(DisplayedKey {
            id: matched.map(|c| c.id.clone()),
            loaded: true,
            encrypted: false,
            name: matched.map(|c| c.name.clone()).unwrap_or_default(),
            key_type: key.key_type.clone(),
            blob: STANDARD.encode(&key.blob),
        });
    }

    for key in configured {
        if claims.contains_key(&key.id) {
            continue;
        }
        result.push(DisplayedKey {
            id: Some(key.id.clone()),
            loaded: false,
            encrypted: key.encrypted,
            name: key.name.clone(),
            key_type: String::new(),
            blob: String::new(),
        });
    }

    result.sort_by(display_order);
    result
}

fn display_order(a: &DisplayedKey, b: &DisplayedKey) -> Ordering {
    a.name
        .cmp(&b.name)
        .then_with(|| a.blob.cmp(&b.blob))
        .then_with(|| a.id.cmp(&b.id))
        // Exact ties only; keeps the output independent of input order.
        .then_with(|| a.loaded.cmp(&b.loaded))
        .then_with(|| a.encrypted.cmp(&b.encrypted))
        .then_with(|| a.key_type.cmp(&b.key_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured(id: &str, name: &str, encrypted: bool) -> ConfiguredKey {
        ConfiguredKey {
            id: KeyId::new(id),
            name: name.to_string(),
            encrypted,
        }
    }

    fn loaded(blob: &[u8], id: Option<&str>) -> LoadedKey {
        let key = LoadedKey::new("ssh-ed25519", blob.to_vec());
        match id {
            Some(id) => key.with_id(KeyId::new(id)),
            None => key,
        }
    }

    fn sample() -> (Vec<ConfiguredKey>, Vec<LoadedKey>) {
        let configured = vec![
            configured("k1", "work", true),
            configured("k2", "home", false),
            configured("k3", "backup", true),
        ];
        let loaded = vec![
            loaded(b"blob-home", Some("k2")),
            loaded(b"blob-foreign", None),
            loaded(b"blob-removed", Some("gone")),
        ];
        (configured, loaded)
    }

    #[test]
    fn empty_inputs_yield_empty_list() {
        assert!(reconcile(&[], &[]).is_empty());
    }

    #[test]
    fn merges_and_sorts() {
        let (configured, loaded) = sample();
        let shown = reconcile(&configured, &loaded);
        let names: Vec<(&str, bool, Option<&str>)> = shown
            .iter()
            .map(|k| (k.name.as_str(), k.loaded, k.id.as_ref().map(|id| id.as_str())))
            .collect();
        assert_eq!(
            names,
            vec![
                ("", true, None),
                ("", true, None),
                ("backup", false, Some("k3")),
                ("home", true, Some("k2")),
                ("work", false, Some("k1")),
            ]
        );
        // Unnamed entries are ordered by blob.
        assert_eq!(shown[0].blob, STANDARD.encode(b"blob-foreign"));
        assert_eq!(shown[1].blob, STANDARD.encode(b"blob-removed"));
    }

    #[test]
    fn order_of_inputs_does_not_matter() {
        let (mut configured, mut loaded) = sample();
        let expected = reconcile(&configured, &loaded);
        for _ in 0..configured.len() {
            configured.rotate_left(1);
            for _ in 0..loaded.len() {
                loaded.rotate_left(1);
                assert_eq!(reconcile(&configured, &loaded), expected);
            }
        }
        configured.reverse();
        loaded.reverse();
        assert_eq!(reconcile(&configured, &loaded), expected);
    }

    #[test]
    fn repeated_calls_are_identical() {
        let (configured, loaded) = sample();
        assert_eq!(
            reconcile(&configured, &loaded),
            reconcile(&configured, &loaded)
        );
    }

    #[test]
    fn encrypted_unloaded_key_has_no_material() {
        let shown = reconcile(&[configured("k1", "work", true)], &[]);
        assert_eq!(
            shown,
            vec![DisplayedKey {
                id: Some(KeyId::new("k1")),
                loaded: false,
                encrypted: true,
                name: "work".to_string(),
                key_type: String::new(),
                blob: String::new(),
            }]
        );
    }

    #[test]
    fn unmatched_loaded_key_is_kept_without_id() {
        let shown = reconcile(&[], &[loaded(b"foreign", None)]);
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].id, None);
        assert_eq!(shown[0].name, "");
        assert!(shown[0].loaded);
        assert_eq!(shown[0].key_type, "ssh-ed25519");
        assert!(!shown[0].is_controllable());
    }

    #[test]
    fn loaded_key_of_removed_entry_is_kept_without_id() {
        let shown = reconcile(
            &[configured("k1", "work", false)],
            &[loaded(b"orphan", Some("k9"))],
        );
        assert_eq!(shown.len(), 2);
        assert_eq!(shown[0].id, None);
        assert!(shown[0].loaded);
        assert_eq!(shown[1].id, Some(KeyId::new("k1")));
        assert!(!shown[1].loaded);
    }

    #[test]
    fn configured_key_is_matched_at_most_once() {
        let configured = vec![configured("k1", "work", false)];
        let forward = vec![loaded(b"bbb", Some("k1")), loaded(b"aaa", Some("k1"))];
        let mut backward = forward.clone();
        backward.reverse();

        let shown = reconcile(&configured, &forward);
        assert_eq!(shown, reconcile(&configured, &backward));
        assert_eq!(shown.len(), 2);
        let matched: Vec<&DisplayedKey> = shown.iter().filter(|k| k.id.is_some()).collect();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].blob, STANDARD.encode(b"aaa"));
        assert_eq!(matched[0].name, "work");
    }

    #[test]
    fn entries_with_equal_names_are_not_merged() {
        let shown = reconcile(
            &[configured("k1", "same", false), configured("k2", "same", false)],
            &[],
        );
        assert_eq!(shown.len(), 2);
        assert_eq!(shown[0].id, Some(KeyId::new("k1")));
        assert_eq!(shown[1].id, Some(KeyId::new("k2")));
    }
}
