#[cfg(test)]
mod tests {
    use crate::events::{EventAction, EventSink};
    use crate::models::{ResourceBody, ResourceKind, VocabularyContent};
    use crate::services::ResourceService;
    use crate::test::utils::test_db::TestDbBuilder;

    #[tokio::test]
    async fn test_mutations_emit_domain_events() {
        let test_db = TestDbBuilder::new()
            .student("anna@example.com", "Anna")
            .build()
            .await
            .expect("Failed to build test database");

        let (sink, mut receiver) = EventSink::new(16);
        let service = ResourceService::new(test_db.pool.clone(), ResourceKind::Vocabulary, sink);

        let anna = test_db
            .principal("anna@example.com")
            .await
            .expect("Failed to load principal");

        let outcome = service
            .create(
                &anna,
                ResourceBody::Vocabulary(VocabularyContent {
                    word: "casa".to_string(),
                    translation: "house".to_string(),
                    pronunciation: String::new(),
                }),
                "",
                &[],
            )
            .await
            .expect("Failed to create vocabulary");

        service
            .delete(&anna, &outcome.created[0].id)
            .await
            .expect("Failed to delete record");

        let created = receiver.try_recv().expect("Expected a created event");
        assert_eq!(created.action, EventAction::Created);
        assert_eq!(created.entity, "vocabulary");

        let deleted = receiver.try_recv().expect("Expected a deleted event");
        assert_eq!(deleted.action, EventAction::Deleted);
    }

    #[tokio::test]
    async fn test_full_sink_never_fails_the_mutation() {
        let test_db = TestDbBuilder::new()
            .student("anna@example.com", "Anna")
            .build()
            .await
            .expect("Failed to build test database");

        // Capacity one and nobody draining: the second emit overflows and is
        // dropped, the mutations still succeed.
        let (sink, _receiver) = EventSink::new(1);
        let service = ResourceService::new(test_db.pool.clone(), ResourceKind::Vocabulary, sink);

        let anna = test_db
            .principal("anna@example.com")
            .await
            .expect("Failed to load principal");

        for word in ["casa", "cane", "gatto"] {
            service
                .create(
                    &anna,
                    ResourceBody::Vocabulary(VocabularyContent {
                        word: word.to_string(),
                        translation: String::new(),
                        pronunciation: String::new(),
                    }),
                    "",
                    &[],
                )
                .await
                .expect("Mutation must not fail on a full sink");
        }

        let records = service
            .get_all(&anna, &[])
            .await
            .expect("Failed to list records");
        assert_eq!(records.len(), 3);
    }
}
