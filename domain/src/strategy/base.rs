use tracing::{debug, info};

use super::SaveOutcome;
use crate::validate::{validate_path, ROOT_PATH};
use crate::{
    Clock, ContentId, CoreError, HistoryEntry, PathCleanup, PathMapper, PathUpdate,
    ResourceDocument, Scope, TreeGenerator, UserId,
};

/// Shared generation, validation and persistence logic.
///
/// It remains generic over the mapper and clock so the tree strategies can
/// be exercised against in-memory doubles.
pub struct StrategyCore<M: PathMapper, C: Clock> {
    mapper: M,
    cleaner: PathCleanup,
    clock: C,
}

impl<M: PathMapper, C: Clock> StrategyCore<M, C> {
    pub fn new(mapper: M, cleaner: PathCleanup, clock: C) -> Self {
        Self {
            mapper,
            cleaner,
            clock,
        }
    }

    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    pub fn cleaner(&self) -> &PathCleanup {
        &self.cleaner
    }

    /// Propose a unique path for `title` below `parent` without persisting it.
    pub fn generate(
        &self,
        title: &str,
        parent: Option<&ContentId>,
        scope: &Scope,
        exclude: Option<&ContentId>,
    ) -> Result<String, CoreError> {
        let parent_path = match parent {
            Some(parent_id) => match self.mapper.load_by_content_uuid(parent_id, scope) {
                Ok(path) => path,
                Err(CoreError::NotFound) => {
                    return Err(CoreError::ParentPathNotFound(parent_id.clone()))
                }
                Err(e) => return Err(e),
            },
            None => ROOT_PATH.to_string(),
        };

        let segment = self.cleaner.cleanup_segment(title, &scope.locale);
        if segment.is_empty() {
            return Err(CoreError::ResourceLocatorNotValid(format!(
                "title {title:?} leaves no usable characters"
            )));
        }
        let candidate = TreeGenerator::join(&parent_path, &segment);
        let path = self.mapper.get_unique_path(&candidate, scope, exclude)?;
        debug!(%scope, %candidate, %path, "generated resource locator");
        Ok(path)
    }

    /// Validate, deduplicate and persist `document.resource_segment`.
    pub fn save(
        &self,
        document: &ResourceDocument,
        user: Option<&UserId>,
    ) -> Result<SaveOutcome, CoreError> {
        self.save_path(
            &document.content_id,
            &document.scope,
            &document.resource_segment,
            user,
        )
    }

    /// Save procedure shared by documents and cascaded descendants.
    ///
    /// Every check runs before the single mapper write.
    pub fn save_path(
        &self,
        content_id: &ContentId,
        scope: &Scope,
        candidate: &str,
        user: Option<&UserId>,
    ) -> Result<SaveOutcome, CoreError> {
        validate_path(candidate)?;

        let current = self.current_path(content_id, scope)?;
        if current.as_deref() == Some(candidate) {
            debug!(content_id = %content_id, path = %candidate, "resource locator unchanged");
            return Ok(SaveOutcome::Unchanged);
        }

        if !self.mapper.unique(candidate, scope)? {
            match self.mapper.load_by_resource_locator(candidate, scope) {
                Ok(holder) if &holder != content_id => {
                    return Err(CoreError::ResourceLocatorAlreadyExists {
                        path: candidate.to_string(),
                        holder,
                    })
                }
                Ok(_) | Err(CoreError::NotFound) => {}
                Err(e) => return Err(e),
            }
        }

        self.mapper.save(&PathUpdate {
            content_id: content_id.clone(),
            scope: scope.clone(),
            path: candidate.to_string(),
            user_id: user.cloned(),
            at: self.clock.now(),
        })?;
        info!(
            content_id = %content_id,
            %scope,
            from = current.as_deref().unwrap_or("-"),
            to = %candidate,
            "resource locator saved"
        );
        Ok(SaveOutcome::Moved {
            from: current,
            to: candidate.to_string(),
        })
    }

    /// Active path of `content_id`, `None` if it never saved one.
    pub fn current_path(
        &self,
        content_id: &ContentId,
        scope: &Scope,
    ) -> Result<Option<String>, CoreError> {
        match self.mapper.load_by_content_uuid(content_id, scope) {
            Ok(path) => Ok(Some(path)),
            Err(CoreError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// The root path belongs to the homepage alone, so it is rejected here.
    pub fn is_valid(&self, path: &str, _webspace_key: &str, _locale: &str) -> bool {
        path != ROOT_PATH && self.cleaner.validate(path)
    }

    pub fn load_by_content(&self, document: &ResourceDocument) -> Result<String, CoreError> {
        self.mapper.load_by_content(document)
    }

    pub fn load_by_content_uuid(
        &self,
        content_id: &ContentId,
        scope: &Scope,
    ) -> Result<String, CoreError> {
        self.mapper.load_by_content_uuid(content_id, scope)
    }

    pub fn load_by_resource_locator(
        &self,
        path: &str,
        scope: &Scope,
    ) -> Result<ContentId, CoreError> {
        self.mapper.load_by_resource_locator(path, scope)
    }

    pub fn load_history_by_content_uuid(
        &self,
        content_id: &ContentId,
        scope: &Scope,
    ) -> Result<Vec<HistoryEntry>, CoreError> {
        self.mapper.load_history_by_content_uuid(content_id, scope)
    }

    pub fn delete_by_id(&self, path: &str, scope: &Scope) -> Result<(), CoreError> {
        self.mapper.delete_by_path(path, scope)?;
        info!(%path, %scope, "resource locator deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_repo::InMemoryPathMapper;
    use std::sync::Arc;
    use std::time::SystemTime;

    struct TestClock;
    impl Clock for TestClock {
        fn now(&self) -> SystemTime {
            SystemTime::UNIX_EPOCH
        }
    }

    fn scope() -> Scope {
        Scope::new("sulu_io", "de", None)
    }

    fn id(s: &str) -> ContentId {
        ContentId::new(s).unwrap()
    }

    fn core() -> (StrategyCore<Arc<InMemoryPathMapper>, TestClock>, Arc<InMemoryPathMapper>) {
        let mapper = Arc::new(InMemoryPathMapper::new());
        let core = StrategyCore::new(mapper.clone(), PathCleanup::default(), TestClock);
        (core, mapper)
    }

    fn doc(content: &str, path: &str) -> ResourceDocument {
        ResourceDocument::new(id(content), path, scope())
    }

    #[test]
    fn generate_suffixes_taken_path() {
        let (core, _) = core();
        core.save(&doc("products", "/products"), None).unwrap();
        core.save(&doc("other", "/products/machines"), None).unwrap();

        let path = core
            .generate("machines", Some(&id("products")), &scope(), None)
            .unwrap();
        assert_eq!(path, "/products/machines-1");
    }

    #[test]
    fn generate_cleans_with_locale_table() {
        let (core, mapper) = core();
        core.save(&doc("products", "/products"), None).unwrap();
        let path = core
            .generate("mä   chines", Some(&id("products")), &scope(), None)
            .unwrap();
        assert_eq!(path, "/products/mae-chines");
        // generate never persists
        assert!(mapper.unique("/products/mae-chines", &scope()).unwrap());
    }

    #[test]
    fn generate_keeps_title_slash_in_one_segment() {
        let (core, _) = core();
        core.save(&doc("products", "/products"), None).unwrap();
        let path = core
            .generate("AC/DC", Some(&id("products")), &scope(), None)
            .unwrap();
        assert_eq!(path, "/products/ac-dc");
    }

    #[test]
    fn generate_without_parent_roots_at_slash() {
        let (core, _) = core();
        assert_eq!(core.generate("About Us", None, &scope(), None).unwrap(), "/about-us");
    }

    #[test]
    fn generate_excludes_own_path() {
        let (core, _) = core();
        core.save(&doc("a", "/team"), None).unwrap();
        assert_eq!(core.generate("Team", None, &scope(), None).unwrap(), "/team-1");
        assert_eq!(core.generate("Team", None, &scope(), Some(&id("a"))).unwrap(), "/team");
    }

    #[test]
    fn generate_fails_for_unsaved_parent() {
        let (core, _) = core();
        let err = core
            .generate("child", Some(&id("ghost")), &scope(), None)
            .unwrap_err();
        assert!(matches!(err, CoreError::ParentPathNotFound(p) if p == id("ghost")));
    }

    #[test]
    fn generate_rejects_empty_title() {
        let (core, _) = core();
        let err = core.generate("???", None, &scope(), None).unwrap_err();
        assert!(matches!(err, CoreError::ResourceLocatorNotValid(_)));
    }

    #[test]
    fn save_twice_is_a_noop() {
        let (core, mapper) = core();
        let d = doc("a", "/products/machines");
        assert!(core.save(&d, None).unwrap().is_moved());
        assert_eq!(core.save(&d, None).unwrap(), SaveOutcome::Unchanged);
        assert_eq!(mapper.save_count(), 1);
        assert!(core
            .load_history_by_content_uuid(&id("a"), &scope())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn save_rejects_invalid_before_touching_mapper() {
        let (core, mapper) = core();
        let err = core.save(&doc("a", "/Test"), None).unwrap_err();
        assert!(matches!(err, CoreError::ResourceLocatorNotValid(_)));
        assert!(err.is_validation());
        assert_eq!(mapper.save_count(), 0);
    }

    #[test]
    fn save_rejects_path_of_other_content() {
        let (core, _) = core();
        core.save(&doc("a", "/taken"), None).unwrap();
        let err = core.save(&doc("b", "/taken"), None).unwrap_err();
        assert!(
            matches!(err, CoreError::ResourceLocatorAlreadyExists { ref holder, .. } if *holder == id("a"))
        );
    }

    #[test]
    fn save_rejects_history_path_of_other_content() {
        let (core, _) = core();
        core.save(&doc("a", "/old"), None).unwrap();
        core.save(&doc("a", "/new"), None).unwrap();
        let err = core.save(&doc("b", "/old"), None).unwrap_err();
        assert!(matches!(err, CoreError::ResourceLocatorAlreadyExists { .. }));
    }

    #[test]
    fn save_may_reclaim_own_history_path() {
        let (core, _) = core();
        core.save(&doc("a", "/old"), None).unwrap();
        core.save(&doc("a", "/new"), None).unwrap();
        let outcome = core.save(&doc("a", "/old"), None).unwrap();
        assert_eq!(
            outcome,
            SaveOutcome::Moved {
                from: Some("/new".into()),
                to: "/old".into()
            }
        );
        assert_eq!(core.load_by_content_uuid(&id("a"), &scope()).unwrap(), "/old");
    }

    #[test]
    fn save_records_user_in_history() {
        let (core, _) = core();
        let user = UserId::new("7").unwrap();
        core.save(&doc("a", "/one"), Some(&user)).unwrap();
        core.save(&doc("a", "/two"), Some(&user)).unwrap();
        let history = core.load_history_by_content_uuid(&id("a"), &scope()).unwrap();
        assert_eq!(history[0].path, "/one");
        assert_eq!(history[0].retired_by, Some(user));
        assert_eq!(history[0].retired_at, SystemTime::UNIX_EPOCH);
    }

    #[test]
    fn is_valid_rejects_root_for_nodes() {
        let (core, _) = core();
        assert!(core.is_valid("/products", "sulu_io", "de"));
        assert!(!core.is_valid("/", "sulu_io", "de"));
        assert!(!core.is_valid("/Products", "sulu_io", "de"));
    }

    #[test]
    fn delete_then_lookup_fails() {
        let (core, _) = core();
        core.save(&doc("a", "/gone"), None).unwrap();
        core.delete_by_id("/gone", &scope()).unwrap();
        assert!(matches!(
            core.load_by_content(&doc("a", "/gone")),
            Err(CoreError::NotFound)
        ));
    }
}
