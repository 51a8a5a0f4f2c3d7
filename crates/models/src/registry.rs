use crate::error::ModelError;
use crate::model::Model;
use core_types::ident::{ID_COLUMN, table_name_for_kind};
use core_types::{ModelKind, SchemaError, SchemaValidator, TableDefinition};
use database::{ColumnFilter, RowStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Instances are grouped by the kind object itself, so two kinds that share a
/// name never see each other's instances. The entry owns an `Arc` of its kind,
/// which keeps the address key from being reused.
type Instances = HashMap<usize, (Arc<ModelKind>, Vec<Model>)>;

fn identity(kind: &ModelKind) -> usize {
    std::ptr::from_ref(kind) as usize
}

/// Creates [`Model`] instances and remembers every one it created, per kind.
#[derive(Default)]
pub struct ModelRegistry {
    validator: SchemaValidator,
    instances: Mutex<Instances>,
}

impl ModelRegistry {
    pub fn new(validator: SchemaValidator) -> Self {
        Self {
            validator,
            instances: Mutex::new(HashMap::new()),
        }
    }

    pub fn validator(&self) -> &SchemaValidator {
        &self.validator
    }

    fn instances(&self) -> MutexGuard<'_, Instances> {
        self.instances.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validates `kind` (once; later calls reuse the verdict) and returns its
    /// table name. The validator logs failures.
    fn table_for(&self, kind: &ModelKind) -> Result<String, SchemaError> {
        self.validator.validate(kind)?;
        Ok(kind
            .table_name()
            .map_or_else(|| table_name_for_kind(kind.name()), str::to_string))
    }

    fn register(&self, kind: &Arc<ModelKind>, models: impl IntoIterator<Item = Model>) {
        self.instances()
            .entry(identity(kind))
            .or_insert_with(|| (Arc::clone(kind), Vec::new()))
            .1
            .extend(models);
    }

    /// A new instance of `kind`, seeded from its defaults and registered.
    ///
    /// Fails, and registers nothing, if the kind does not validate.
    pub fn create(&self, kind: &Arc<ModelKind>) -> Result<Model, SchemaError> {
        let table = self.table_for(kind)?;
        let model = Model::new(Arc::clone(kind), table);
        self.register(kind, [model.clone()]);
        tracing::debug!(kind = kind.name(), "Instance created.");
        Ok(model)
    }

    /// Every registered instance of `kind`, in creation order.
    ///
    /// The returned vector is a copy; pushing to or removing from it does not
    /// touch the registry.
    pub fn get_all_models(&self, kind: &ModelKind) -> Vec<Model> {
        self.instances()
            .get(&identity(kind))
            .map(|(_, models)| models.clone())
            .unwrap_or_default()
    }

    /// Creates the kind's table unless it exists. Returns whether it did.
    pub async fn ensure_table(
        &self,
        kind: &Arc<ModelKind>,
        store: &dyn RowStore,
    ) -> Result<bool, ModelError> {
        self.table_for(kind)?;
        let definition = TableDefinition::for_kind(kind)
            .ok_or_else(|| SchemaError::InvalidKindName(kind.name().to_string()))?;
        let created = store.ensure_table(&definition).await.inspect_err(|e| {
            tracing::error!(kind = kind.name(), table = definition.name(), error = %e, "Failed to provision table.");
        })?;
        Ok(created)
    }

    /// Loads every stored row of `kind` as a clean, registered instance.
    ///
    /// Stored values go through the same checks as [`Model::set`]; a NULL
    /// column keeps the attribute's default.
    pub async fn fetch_all(
        &self,
        kind: &Arc<ModelKind>,
        store: &dyn RowStore,
    ) -> Result<Vec<Model>, ModelError> {
        let table = self.table_for(kind)?;
        let filter: ColumnFilter = std::iter::once(ID_COLUMN)
            .chain(kind.attribute_names())
            .map(|column| (column.to_string(), None))
            .collect();

        let rows = store.get(&table, &filter).await.inspect_err(|e| {
            tracing::error!(kind = kind.name(), table = %table, error = %e, "Failed to load stored rows.");
        })?;

        let mut models = Vec::with_capacity(rows.len());
        for record in rows.records() {
            let model = Model::new(Arc::clone(kind), table.clone());
            let mut id = None;
            for (column, value) in record {
                if column == ID_COLUMN {
                    id = value.as_int();
                } else if !value.is_null() {
                    model.set(column, value.clone())?;
                }
            }
            model.mark_persisted(id);
            models.push(model);
        }

        tracing::debug!(kind = kind.name(), count = models.len(), "Loaded stored instances.");
        self.register(kind, models.iter().cloned());
        Ok(models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AttributeError;
    use crate::memory::MemoryStore;
    use core_types::{AttributeSpec, Validator, Value, ValueType};

    fn movie_kind() -> Arc<ModelKind> {
        ModelKind::builder("Movie")
            .attribute("title", AttributeSpec::new(ValueType::Text, "varchar"))
            .attribute(
                "year",
                AttributeSpec::new(ValueType::Int, "integer")
                    .with_default(2000)
                    .with_validator(Validator::named("release_year")),
            )
            .build()
    }

    #[test]
    fn create_validates_and_registers() {
        let registry = ModelRegistry::default();
        let kind = movie_kind();
        let first = registry.create(&kind).unwrap();
        let second = registry.create(&kind).unwrap();

        assert!(kind.is_validated());
        assert_eq!(first.table_name(), "movie_table");
        let all = registry.get_all_models(&kind);
        assert_eq!(all.len(), 2);
        assert!(all[0].same_instance(&first));
        assert!(all[1].same_instance(&second));
    }

    #[test]
    fn invalid_kind_produces_no_instance() {
        let registry = ModelRegistry::default();
        let kind = ModelKind::builder("Broken")
            .attribute("title", AttributeSpec::new(ValueType::Text, "blob"))
            .build();

        let err = registry.create(&kind).unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedSqlType { .. }));
        assert!(!kind.is_validated());
        assert!(registry.get_all_models(&kind).is_empty());
    }

    #[test]
    fn unresolved_validator_produces_no_instance() {
        let registry = ModelRegistry::default();
        let kind = ModelKind::builder("Song")
            .attribute(
                "title",
                AttributeSpec::new(ValueType::Text, "text")
                    .with_validator(Validator::named("no_such_check")),
            )
            .build();
        assert!(matches!(
            registry.create(&kind),
            Err(SchemaError::ValidatorNotCallable { .. })
        ));
    }

    #[test]
    fn kinds_sharing_a_name_keep_separate_instances() {
        let registry = ModelRegistry::default();
        let movie = movie_kind();
        let other_movie = ModelKind::builder("Movie")
            .attribute("title", AttributeSpec::new(ValueType::Text, "text"))
            .build();

        let first = registry.create(&movie).unwrap();
        registry.create(&other_movie).unwrap();
        registry.create(&other_movie).unwrap();

        let movies = registry.get_all_models(&movie);
        assert_eq!(movies.len(), 1);
        assert!(movies[0].same_instance(&first));
        assert_eq!(registry.get_all_models(&other_movie).len(), 2);
        assert!(registry.get_all_models(&movie_kind()).is_empty());
    }

    #[test]
    fn snapshot_is_detached_from_registry() {
        let registry = ModelRegistry::default();
        let kind = movie_kind();
        registry.create(&kind).unwrap();

        let mut snapshot = registry.get_all_models(&kind);
        snapshot.clear();
        assert_eq!(registry.get_all_models(&kind).len(), 1);
    }

    #[tokio::test]
    async fn end_to_end_with_release_year_validator() {
        let registry = ModelRegistry::default();
        let store = MemoryStore::default();
        let kind = movie_kind();

        assert!(registry.ensure_table(&kind, &store).await.unwrap());
        assert!(!registry.ensure_table(&kind, &store).await.unwrap());

        let movie = registry.create(&kind).unwrap();
        movie.set("title", "Arrival").unwrap();
        assert!(matches!(
            movie.set("year", "1850"),
            Err(AttributeError::InvalidValue { .. })
        ));
        assert_eq!(movie.get("year"), Value::Int(2000));
        movie.set("year", "2016").unwrap();
        assert_eq!(movie.get("year"), Value::Int(2016));

        let id = movie.save(&store).await.unwrap();
        assert!(id.is_some());
        assert_eq!(movie.save(&store).await.unwrap(), None);
        assert_eq!(store.row_count("movie_table"), 1);
    }

    #[tokio::test]
    async fn fetch_all_hydrates_clean_instances() {
        let registry = ModelRegistry::default();
        let store = MemoryStore::default();
        let kind = movie_kind();
        registry.ensure_table(&kind, &store).await.unwrap();

        for (title, year) in [("Arrival", 2016), ("Dune", 2021)] {
            let movie = registry.create(&kind).unwrap();
            movie.set("title", title).unwrap();
            movie.set("year", year).unwrap();
            movie.save(&store).await.unwrap();
        }

        let fresh = ModelRegistry::default();
        let loaded = fresh.fetch_all(&kind, &store).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id(), Some(1));
        assert_eq!(loaded[0].get("title"), Value::from("Arrival"));
        assert_eq!(loaded[1].get("year"), Value::Int(2021));
        assert!(loaded.iter().all(|m| !m.is_dirty()));
        assert_eq!(fresh.get_all_models(&kind).len(), 2);

        let statements = store.statements();
        loaded[0].save(&store).await.unwrap();
        assert_eq!(store.statements(), statements);
    }

    #[tokio::test]
    async fn store_failures_surface_as_database_errors() {
        let registry = ModelRegistry::default();
        let kind = movie_kind();
        let result = registry.fetch_all(&kind, &MemoryStore::failing()).await;
        assert!(matches!(result, Err(ModelError::Database(_))));
    }
}
