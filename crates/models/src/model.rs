use crate::error::{AttributeError, ModelError};
use core_types::ident::{ID_COLUMN, TABLENAME_KEY};
use core_types::{ModelKind, Value};
use database::{AttrMap, RowStore};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug)]
struct ModelState {
    id: Option<i64>,
    dirty: bool,
    /// Bumped by every accepted `set`; lets `save` tell whether the instance
    /// changed while its statement was in flight.
    revision: u64,
    values: AttrMap,
}

struct ModelInner {
    kind: Arc<ModelKind>,
    table: String,
    state: RwLock<ModelState>,
    /// Held for the whole of `save`, so two handles never both insert.
    saving: tokio::sync::Mutex<()>,
}

/// One record of a [`ModelKind`].
///
/// Clones are handles onto the same instance: a `set` through one is seen by
/// all of them, including the copy held by the registry.
#[derive(Clone)]
pub struct Model {
    inner: Arc<ModelInner>,
}

impl Model {
    /// A new, unsaved instance seeded from the kind's defaults.
    pub(crate) fn new(kind: Arc<ModelKind>, table: String) -> Self {
        let values = kind
            .attributes()
            .iter()
            .map(|decl| (decl.name.clone(), decl.spec.default.clone()))
            .collect();
        Self {
            inner: Arc::new(ModelInner {
                kind,
                table,
                state: RwLock::new(ModelState {
                    id: None,
                    dirty: true,
                    revision: 0,
                    values,
                }),
                saving: tokio::sync::Mutex::new(()),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ModelState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ModelState> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn kind(&self) -> &Arc<ModelKind> {
        &self.inner.kind
    }

    pub fn table_name(&self) -> &str {
        &self.inner.table
    }

    /// The row id; `None` until the first successful insert.
    pub fn id(&self) -> Option<i64> {
        self.read().id
    }

    /// Whether some attribute change has not reached the store yet.
    pub fn is_dirty(&self) -> bool {
        self.read().dirty
    }

    /// Current value of `name`.
    ///
    /// `tablename`, in any case, resolves to the kind's table name. Names the
    /// kind does not declare read as [`Value::Null`].
    pub fn get(&self, name: &str) -> Value {
        if name.eq_ignore_ascii_case(TABLENAME_KEY) {
            return Value::Text(self.inner.table.clone());
        }
        self.read().values.get(name).cloned().unwrap_or(Value::Null)
    }

    /// Sets attribute `name`, converting `value` to the declared type and
    /// running the attribute's validator. On any error the previous value is
    /// kept.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<(), AttributeError> {
        let value = value.into();
        let kind = &self.inner.kind;

        let Some(spec) = kind.attribute(name) else {
            tracing::warn!(kind = kind.name(), attribute = name, "Ignoring write to an undeclared attribute.");
            return Err(AttributeError::UnknownAttribute {
                kind: kind.name().to_string(),
                name: name.to_string(),
            });
        };

        let rejected = |reason: String| {
            tracing::warn!(
                kind = kind.name(),
                attribute = name,
                value = %value,
                expected = %spec.value_type,
                reason = %reason,
                "Attribute value rejected."
            );
            AttributeError::InvalidValue {
                kind: kind.name().to_string(),
                attribute: name.to_string(),
                value: value.to_string(),
                expected: spec.value_type,
                reason,
            }
        };

        if value.is_null() {
            return Err(rejected("attributes cannot be set to null".to_string()));
        }
        let coerced = value
            .clone()
            .coerce_to(spec.value_type)
            .map_err(|e| rejected(e.to_string()))?;
        if let Some(validator) = &spec.validator {
            validator
                .check(&coerced)
                .map_err(|reason| rejected(format!("{} validator: {reason}", validator.name())))?;
        }

        let mut state = self.write();
        state.values.insert(name.to_string(), coerced);
        state.dirty = true;
        state.revision += 1;
        Ok(())
    }

    /// Snapshot of the attribute values, without the id.
    pub fn values(&self) -> AttrMap {
        self.read().values.clone()
    }

    /// Snapshot of the attribute values plus `id` (`Null` while unsaved).
    pub fn to_attr_map(&self) -> AttrMap {
        let state = self.read();
        let mut attrs = state.values.clone();
        attrs.insert(ID_COLUMN.to_string(), Value::from(state.id));
        attrs
    }

    /// Writes the instance through `store`: an insert the first time, an
    /// update when it has an id and is dirty, nothing when it is clean.
    ///
    /// Returns the id assigned by an insert. Saves through different handles of
    /// one instance run one after the other.
    pub async fn save(&self, store: &dyn RowStore) -> Result<Option<i64>, ModelError> {
        let _saving = self.inner.saving.lock().await;
        let (attrs, revision) = {
            let state = self.read();
            if state.id.is_some() && !state.dirty {
                tracing::debug!(table = %self.inner.table, id = ?state.id, "Instance is clean, nothing to save.");
                return Ok(None);
            }
            let mut attrs = state.values.clone();
            attrs.insert(ID_COLUMN.to_string(), Value::from(state.id));
            (attrs, state.revision)
        };

        let new_id = store
            .save(&self.inner.table, attrs)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    kind = self.inner.kind.name(),
                    table = %self.inner.table,
                    error = %e,
                    "Failed to save instance."
                );
            })?;

        let mut state = self.write();
        if let Some(id) = new_id {
            state.id = Some(id);
        }
        if state.revision == revision {
            state.dirty = false;
        }
        Ok(new_id)
    }

    /// Marks a freshly hydrated instance as the stored row `id`.
    pub(crate) fn mark_persisted(&self, id: Option<i64>) {
        let mut state = self.write();
        state.id = id;
        state.dirty = false;
    }

    #[cfg(test)]
    pub(crate) fn same_instance(&self, other: &Model) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("Model")
            .field("kind", &self.inner.kind.name())
            .field("id", &state.id)
            .field("dirty", &state.dirty)
            .field("values", &state.values)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use core_types::{AttributeSpec, Validator, ValueType};

    fn movie() -> Model {
        let kind = ModelKind::builder("Movie")
            .attribute("title", AttributeSpec::new(ValueType::Text, "varchar"))
            .attribute(
                "release_year",
                AttributeSpec::new(ValueType::Int, "integer")
                    .with_default(2000)
                    .with_validator(Validator::named("release_year")),
            )
            .build();
        Model::new(kind, "movie_table".to_string())
    }

    #[test]
    fn new_instance_is_seeded_from_defaults() {
        let model = movie();
        assert_eq!(model.id(), None);
        assert!(model.is_dirty());
        assert_eq!(model.get("title"), Value::Null);
        assert_eq!(model.get("release_year"), Value::Int(2000));
    }

    #[test]
    fn tablename_lookup_ignores_case() {
        let model = movie();
        assert_eq!(model.get("tablename"), Value::from("movie_table"));
        assert_eq!(model.get("TableName"), Value::from("movie_table"));
    }

    #[test]
    fn set_coerces_to_the_declared_type() {
        let model = movie();
        model.set("release_year", "2016").unwrap();
        assert_eq!(model.get("release_year"), Value::Int(2016));
        model.set("title", "Arrival").unwrap();
        assert_eq!(model.get("title"), Value::from("Arrival"));
    }

    #[test]
    fn unknown_attribute_changes_nothing() {
        let model = movie();
        let before = model.values();
        let err = model.set("director", "Villeneuve").unwrap_err();
        assert_eq!(
            err,
            AttributeError::UnknownAttribute {
                kind: "Movie".to_string(),
                name: "director".to_string()
            }
        );
        assert_eq!(model.values(), before);
        assert_eq!(model.get("director"), Value::Null);
    }

    #[test]
    fn validator_rejection_keeps_previous_value() {
        let model = movie();
        let err = model.set("release_year", "1850").unwrap_err();
        assert!(matches!(err, AttributeError::InvalidValue { ref attribute, .. } if attribute == "release_year"));
        assert_eq!(model.get("release_year"), Value::Int(2000));
    }

    #[test]
    fn uncoercible_and_null_values_are_rejected() {
        let model = movie();
        assert!(model.set("release_year", "next year").is_err());
        assert!(model.set("release_year", 2016.5).is_err());
        assert!(model.set("release_year", Value::Null).is_err());
        assert_eq!(model.get("release_year"), Value::Int(2000));
    }

    #[test]
    fn clones_share_state() {
        let model = movie();
        let handle = model.clone();
        handle.set("title", "Arrival").unwrap();
        assert_eq!(model.get("title"), Value::from("Arrival"));
        assert!(model.same_instance(&handle));
    }

    #[tokio::test]
    async fn save_inserts_once_then_updates_only_when_dirty() {
        let store = MemoryStore::default();
        let model = movie();
        model.set("title", "Arrival").unwrap();
        model.set("release_year", 2016).unwrap();

        let id = model.save(&store).await.unwrap();
        assert_eq!(id, Some(1));
        assert_eq!(model.id(), Some(1));
        assert!(!model.is_dirty());

        assert_eq!(model.save(&store).await.unwrap(), None);
        assert_eq!(store.statements(), 1);
        assert_eq!(store.row_count("movie_table"), 1);

        model.set("title", "Arrival (2016)").unwrap();
        assert!(model.is_dirty());
        assert_eq!(model.save(&store).await.unwrap(), None);
        assert!(!model.is_dirty());
        assert_eq!(store.statements(), 2);
        assert_eq!(store.row_count("movie_table"), 1);
        assert_eq!(
            store.row("movie_table", 1).unwrap().get("title"),
            Some(&Value::from("Arrival (2016)"))
        );
    }

    #[tokio::test]
    async fn concurrent_saves_through_clones_insert_once() {
        let store = MemoryStore::yielding();
        let model = movie();
        model.set("title", "Arrival").unwrap();
        let other = model.clone();

        let (first, second) = tokio::join!(model.save(&store), other.save(&store));
        let mut ids = [first.unwrap(), second.unwrap()];
        ids.sort();
        assert_eq!(ids, [None, Some(1)]);
        assert_eq!(store.row_count("movie_table"), 1);
        assert_eq!(store.statements(), 1);
        assert_eq!(model.id(), Some(1));
        assert!(!other.is_dirty());
    }

    #[tokio::test]
    async fn failed_save_leaves_instance_dirty() {
        let store = MemoryStore::failing();
        let model = movie();
        assert!(matches!(
            model.save(&store).await,
            Err(ModelError::Database(_))
        ));
        assert_eq!(model.id(), None);
        assert!(model.is_dirty());
    }

    #[test]
    fn attr_map_carries_the_id() {
        let model = movie();
        assert_eq!(model.to_attr_map().get("id"), Some(&Value::Null));
        model.mark_persisted(Some(4));
        assert_eq!(model.to_attr_map().get("id"), Some(&Value::Int(4)));
        assert!(!model.is_dirty());
    }
}
