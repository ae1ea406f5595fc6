use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use common::events::{PhotoUploaded, SUBJECT_PHOTO_UPLOADED};
use common::retry::calculate_backoff;
use events::{EventsError, JetStreamBus, SubscribeOptions};

use crate::thumbnail::{process_event, ThumbnailContext};

/// Queue group name; every worker process joins it, so each upload is
/// thumbnailed by exactly one of them.
pub const QUEUE_GROUP: &str = "thumbnailer";

/// Additional attempts after the first failure, before the message is NAK'd
/// back to the broker.
pub const MAX_RETRIES: u8 = 3;

const BACKOFF_BASE_MS: u64 = 1_000;
const BACKOFF_MAX_MS: u64 = 60_000;

/// What to tell the broker about a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ack,
    Nak,
}

/// Decode and process one delivery payload, retrying transient failures with
/// exponential backoff. Poison messages (undecodable payloads, terminal
/// processing failures) are acked so the broker stops redelivering them.
pub async fn handle_payload(ctx: &ThumbnailContext, payload: &[u8]) -> Outcome {
    let event: PhotoUploaded = match serde_json::from_slice(payload) {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "Failed to decode photo.uploaded payload, dropping");
            return Outcome::Ack;
        }
    };

    let mut attempt: u8 = 0;
    loop {
        match process_event(ctx, &event).await {
            Ok(()) => return Outcome::Ack,
            Err(e) if e.is_terminal() => {
                error!(photo_id = %event.id, error = %e, "Terminal failure, dropping message");
                return Outcome::Ack;
            }
            Err(e) => {
                if attempt >= MAX_RETRIES {
                    error!(
                        photo_id = %event.id,
                        error = %e,
                        attempts = MAX_RETRIES + 1,
                        "Giving up, returning message to the broker"
                    );
                    return Outcome::Nak;
                }
                attempt += 1;
                let backoff = calculate_backoff(attempt, BACKOFF_BASE_MS, BACKOFF_MAX_MS);
                warn!(
                    photo_id = %event.id,
                    error = %e,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "Processing failed, retrying"
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

/// Consume `photo.uploaded` with a bounded worker pool. The delivery loop
/// blocks on a pool slot before spawning, so backpressure reaches the broker
/// once all workers are busy.
pub async fn run(
    ctx: Arc<ThumbnailContext>,
    bus: &JetStreamBus,
    workers: usize,
) -> Result<(), EventsError> {
    let mut deliveries = bus
        .queue_subscribe(
            SUBJECT_PHOTO_UPLOADED,
            QUEUE_GROUP,
            SubscribeOptions::default(),
        )
        .await?;

    let pool = Arc::new(Semaphore::new(workers));
    info!(workers, subject = SUBJECT_PHOTO_UPLOADED, "Consuming");

    while let Some(delivery) = deliveries.next().await {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(e) => {
                error!(error = %e, "Failed to pull delivery");
                continue;
            }
        };

        let Ok(permit) = Arc::clone(&pool).acquire_owned().await else {
            break;
        };

        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            let _permit = permit;
            let outcome = handle_payload(&ctx, delivery.payload()).await;
            let result = match outcome {
                Outcome::Ack => delivery.ack().await,
                Outcome::Nak => delivery.nak().await,
            };
            if let Err(e) = result {
                error!(error = %e, "Failed to acknowledge delivery");
            }
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;
    use uuid::Uuid;

    use common::photos::{
        MemoryPhotoStore, NewPhoto, Photo, PhotoStore, StoreError,
    };
    use common::storage::{MemoryObjectStore, ObjectStore};

    use crate::thumbnail::{png_bytes, thumbnail_key};

    /// Delegating store whose `merge_thumbnail` fails a configured number of
    /// times before succeeding.
    struct FlakyPhotoStore {
        inner: MemoryPhotoStore,
        merge_failures: AtomicU32,
    }

    impl FlakyPhotoStore {
        fn new(merge_failures: u32) -> Self {
            Self {
                inner: MemoryPhotoStore::new(),
                merge_failures: AtomicU32::new(merge_failures),
            }
        }
    }

    #[async_trait]
    impl PhotoStore for FlakyPhotoStore {
        async fn save_photo(&self, photo: &NewPhoto) -> Result<(), StoreError> {
            self.inner.save_photo(photo).await
        }
        async fn get_photo(&self, id: Uuid) -> Result<Photo, StoreError> {
            self.inner.get_photo(id).await
        }
        async fn delete_photo(&self, id: Uuid) -> Result<(), StoreError> {
            self.inner.delete_photo(id).await
        }
        async fn list_active(&self) -> Result<Vec<Photo>, StoreError> {
            self.inner.list_active().await
        }
        async fn list_trashed(&self) -> Result<Vec<Photo>, StoreError> {
            self.inner.list_trashed().await
        }
        async fn trash_photo(&self, id: Uuid) -> Result<(), StoreError> {
            self.inner.trash_photo(id).await
        }
        async fn restore_photo(&self, id: Uuid) -> Result<(), StoreError> {
            self.inner.restore_photo(id).await
        }
        async fn empty_trash(&self) -> Result<u64, StoreError> {
            self.inner.empty_trash().await
        }
        async fn permanently_delete(&self, id: Uuid) -> Result<(), StoreError> {
            self.inner.permanently_delete(id).await
        }
        async fn merge_thumbnail(&self, id: Uuid, size: &str, key: &str) -> Result<(), StoreError> {
            let remaining = self.merge_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.merge_failures.store(remaining - 1, Ordering::SeqCst);
                return Err(StoreError::Decode("transient failure".into()));
            }
            self.inner.merge_thumbnail(id, size, key).await
        }
    }

    async fn seeded(
        photos: Arc<dyn PhotoStore>,
    ) -> (ThumbnailContext, PhotoUploaded, Uuid, Arc<MemoryObjectStore>) {
        let storage = Arc::new(MemoryObjectStore::new());
        let id = Uuid::new_v4();
        let s3_key = format!("photos/{id}");

        photos
            .save_photo(&NewPhoto {
                id,
                s3_key: s3_key.clone(),
                filename: "cat.png".into(),
                mime: "image/png".into(),
            })
            .await
            .unwrap();
        storage
            .put(&s3_key, Bytes::from(png_bytes(800, 600)), "image/png")
            .await
            .unwrap();

        let event = PhotoUploaded::new(id, "cat.png", "image/png", &s3_key);
        (
            ThumbnailContext {
                storage: storage.clone(),
                photos,
                sizes: vec![512],
            },
            event,
            id,
            storage,
        )
    }

    #[tokio::test]
    async fn happy_path_acks() {
        let (ctx, event, id, storage) = seeded(Arc::new(MemoryPhotoStore::new())).await;
        let payload = serde_json::to_vec(&event).unwrap();

        assert_eq!(handle_payload(&ctx, &payload).await, Outcome::Ack);
        assert!(storage.contains(&thumbnail_key(512, id)));
    }

    #[tokio::test]
    async fn garbage_payload_is_acked_as_poison() {
        let (ctx, _, _, _) = seeded(Arc::new(MemoryPhotoStore::new())).await;
        assert_eq!(handle_payload(&ctx, b"not json").await, Outcome::Ack);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_retry_then_succeed() {
        let store = Arc::new(FlakyPhotoStore::new(2));
        let (ctx, event, id, _) = seeded(store).await;
        let payload = serde_json::to_vec(&event).unwrap();

        assert_eq!(handle_payload(&ctx, &payload).await, Outcome::Ack);

        let photo = ctx.photos.get_photo(id).await.unwrap();
        assert_eq!(photo.thumbnail_keys().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_nak_and_redelivery_converges() {
        // Fails the first delivery's four attempts, then recovers.
        let store = Arc::new(FlakyPhotoStore::new((MAX_RETRIES + 1) as u32));
        let (ctx, event, id, _) = seeded(store).await;
        let payload = serde_json::to_vec(&event).unwrap();

        assert_eq!(handle_payload(&ctx, &payload).await, Outcome::Nak);

        // Broker redelivery: same payload, now the merge works, and the
        // metadata ends up with exactly one entry for the size.
        assert_eq!(handle_payload(&ctx, &payload).await, Outcome::Ack);

        let photo = ctx.photos.get_photo(id).await.unwrap();
        assert_eq!(photo.thumbnail_keys().len(), 1);
        assert_eq!(
            photo.thumbnail_key("512"),
            Some(thumbnail_key(512, id).as_str())
        );
    }

    #[tokio::test]
    async fn missing_blob_is_terminal_and_acked() {
        let ctx = ThumbnailContext {
            storage: Arc::new(MemoryObjectStore::new()),
            photos: Arc::new(MemoryPhotoStore::new()),
            sizes: vec![512],
        };
        let event = PhotoUploaded::new(Uuid::new_v4(), "cat.png", "image/png", "photos/gone");
        let payload = serde_json::to_vec(&event).unwrap();

        assert_eq!(handle_payload(&ctx, &payload).await, Outcome::Ack);
    }
}
