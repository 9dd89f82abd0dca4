//! Tests for transaction nesting semantics
//!
//! Uses a recording resource so the tests can assert exactly how many
//! BEGIN/ROLLBACK statements reach the underlying connection.

#[cfg(test)]
mod tests {
    use crate::db::{
        DatabaseError, TransactionController, TransactionError, TransactionalResource,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingResource {
        begins: AtomicU32,
        rollbacks: AtomicU32,
    }

    #[async_trait]
    impl TransactionalResource for RecordingResource {
        async fn begin(&self) -> Result<(), DatabaseError> {
            self.begins.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn rollback(&self) -> Result<(), DatabaseError> {
            self.rollbacks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn create_controller() -> (TransactionController, Arc<RecordingResource>) {
        let resource = Arc::new(RecordingResource::default());
        let controller = TransactionController::new(resource.clone());
        (controller, resource)
    }

    #[tokio::test]
    async fn test_begin_rollback_pair_reaches_resource_once() {
        let (controller, resource) = create_controller();

        assert_eq!(controller.begin().await.unwrap(), 1);
        assert_eq!(controller.rollback().await.unwrap(), 0);

        assert_eq!(resource.begins.load(Ordering::SeqCst), 1);
        assert_eq!(resource.rollbacks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_nested_begin_stacks_without_error() {
        let (controller, resource) = create_controller();

        assert_eq!(controller.begin().await.unwrap(), 1);
        assert_eq!(controller.begin().await.unwrap(), 2);

        // Only the outermost begin reaches the resource.
        assert_eq!(resource.begins.load(Ordering::SeqCst), 1);

        assert_eq!(controller.rollback().await.unwrap(), 1);
        assert_eq!(resource.rollbacks.load(Ordering::SeqCst), 0);

        assert_eq!(controller.rollback().await.unwrap(), 0);
        assert_eq!(resource.rollbacks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unbalanced_rollback_is_reported() {
        let (controller, resource) = create_controller();

        let err = controller.rollback().await.unwrap_err();
        assert!(matches!(err, TransactionError::Unbalanced));
        assert_eq!(resource.rollbacks.load(Ordering::SeqCst), 0);

        // The controller stays usable after the error.
        assert_eq!(controller.begin().await.unwrap(), 1);
        assert_eq!(controller.rollback().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_depth_never_goes_negative_across_sequences() {
        let (controller, resource) = create_controller();

        // Matched cycles interleaved with unbalanced rollbacks.
        for _ in 0..3 {
            controller.begin().await.unwrap();
            controller.begin().await.unwrap();
            controller.rollback().await.unwrap();
            controller.rollback().await.unwrap();
            assert!(controller.rollback().await.is_err());
            assert_eq!(controller.depth().await, 0);
        }

        // One resource-level pair per matched 0->1->0 cycle.
        assert_eq!(resource.begins.load(Ordering::SeqCst), 3);
        assert_eq!(resource.rollbacks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_joinable_flag_tracks_open_transaction() {
        let (controller, _resource) = create_controller();

        assert!(controller.is_joinable().await);
        controller.begin().await.unwrap();
        assert!(!controller.is_joinable().await);
        controller.rollback().await.unwrap();
        assert!(controller.is_joinable().await);
    }
}
