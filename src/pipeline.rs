//! Intake pipeline: dedup, classify and route incoming messages.

use crate::decision::DecisionEngine;
use crate::folders::{Folder, FolderStore};
use crate::message::{NormalizedMessage, NO_SIMILAR_SPAM};

/// Outcome of one drained batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntakeReport {
    pub inbox: usize,
    pub spam: usize,
    pub duplicates: usize,
}

impl IntakeReport {
    pub fn processed(&self) -> usize {
        self.inbox + self.spam + self.duplicates
    }

    /// Messages that were classified and stored, duplicates excluded.
    pub fn routed(&self) -> usize {
        self.inbox + self.spam
    }
}

pub struct IntakePipeline {
    engine: DecisionEngine,
}

impl IntakePipeline {
    pub fn new(engine: DecisionEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    /// Consume every queued message in arrival order. Duplicates of a message
    /// already in either folder (including one routed earlier in this batch)
    /// are dropped. The queue is always empty afterwards.
    pub fn drain_incoming(
        &self,
        incoming: &mut Vec<NormalizedMessage>,
        folders: &mut FolderStore,
    ) -> IntakeReport {
        let mut report = IntakeReport::default();

        for message in incoming.drain(..) {
            if folders.contains_id(&message.id) {
                log::debug!("Dropping duplicate message {}", message.id);
                report.duplicates += 1;
                continue;
            }

            let (folder, message) = self.classify(message);
            match folder {
                Folder::Inbox => report.inbox += 1,
                Folder::Spam => report.spam += 1,
            }
            folders.push(folder, message);
        }

        if report.routed() > 0 {
            log::info!(
                "Intake batch done: {} inbox, {} spam, {} duplicates dropped",
                report.inbox,
                report.spam,
                report.duplicates
            );
        } else if report.duplicates > 0 {
            log::debug!("Intake batch held only {} duplicates", report.duplicates);
        }
        report
    }

    /// Run the decision engine and attach its verdict to the message.
    pub fn classify(&self, mut message: NormalizedMessage) -> (Folder, NormalizedMessage) {
        let decision = self.engine.classify(&message.subject, &message.body);

        message.spam_score = decision.score;
        message.spam_reason = Some(decision.reason_text());
        message.similar_spam = Some(
            decision
                .similar_spam
                .clone()
                .unwrap_or_else(|| NO_SIMILAR_SPAM.to_string()),
        );

        let folder = if decision.is_spam {
            Folder::Spam
        } else {
            Folder::Inbox
        };
        log::debug!(
            "Message {} ('{}') -> {} (score {:.2})",
            message.id,
            message.display_subject(),
            folder,
            message.spam_score
        );

        (folder, message)
    }
}

/// Incoming queue plus folders, driven by one pipeline.
///
/// Not internally synchronized: a multi-threaded driver must guard the whole
/// mailroom with a single lock so that dedup and routing stay consistent.
pub struct Mailroom {
    pipeline: IntakePipeline,
    incoming: Vec<NormalizedMessage>,
    folders: FolderStore,
}

impl Mailroom {
    pub fn new(pipeline: IntakePipeline) -> Self {
        Self::with_folders(pipeline, FolderStore::new())
    }

    pub fn with_folders(pipeline: IntakePipeline, folders: FolderStore) -> Self {
        Self {
            pipeline,
            incoming: Vec::new(),
            folders,
        }
    }

    pub fn enqueue(&mut self, message: NormalizedMessage) {
        self.incoming.push(message);
    }

    pub fn enqueue_all<I: IntoIterator<Item = NormalizedMessage>>(&mut self, messages: I) {
        self.incoming.extend(messages);
    }

    pub fn pending(&self) -> usize {
        self.incoming.len()
    }

    pub fn process_incoming(&mut self) -> IntakeReport {
        self.pipeline
            .drain_incoming(&mut self.incoming, &mut self.folders)
    }

    pub fn folders(&self) -> &FolderStore {
        &self.folders
    }

    pub fn folders_mut(&mut self) -> &mut FolderStore {
        &mut self.folders
    }

    pub fn into_folders(self) -> FolderStore {
        self.folders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::KeywordScanner;
    use crate::test_support::{FailingClassifier, FailingCorpus, FixedClassifier, FixedCorpus};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn pipeline_with(classifier: Arc<FixedClassifier>) -> IntakePipeline {
        IntakePipeline::new(DecisionEngine::new(
            KeywordScanner::new(),
            classifier,
            Arc::new(FixedCorpus::empty()),
        ))
    }

    fn pipeline() -> IntakePipeline {
        pipeline_with(Arc::new(FixedClassifier::new(0.05)))
    }

    fn msg(id: &str, subject: &str, body: &str) -> NormalizedMessage {
        NormalizedMessage::new(id, "Sender", subject, body)
    }

    #[test]
    fn test_routes_by_decision() {
        let pipeline = pipeline();
        let mut folders = FolderStore::new();
        let mut incoming = vec![
            msg("m1", "YOU WON!", "Click here to claim your prize."),
            msg("m2", "Meeting", "Don't forget the meeting tomorrow."),
        ];

        let report = pipeline.drain_incoming(&mut incoming, &mut folders);

        assert_eq!(
            report,
            IntakeReport {
                inbox: 1,
                spam: 1,
                duplicates: 0,
            }
        );
        assert!(incoming.is_empty());

        let spam = &folders.spam()[0];
        assert_eq!(spam.id, "m1");
        assert_eq!(spam.spam_score, 1.0);
        assert!(spam
            .spam_reason
            .as_deref()
            .unwrap()
            .contains("suspicious keyword detected"));
        assert_eq!(spam.similar_spam.as_deref(), Some("Ninguno"));

        let ham = &folders.inbox()[0];
        assert_eq!(ham.id, "m2");
        assert_eq!(ham.spam_score, 0.05);
        assert_eq!(ham.spam_reason.as_deref(), Some("Parece legitimo"));
    }

    #[test]
    fn test_duplicate_in_same_batch_is_dropped() {
        let classifier = Arc::new(FixedClassifier::new(0.05));
        let pipeline = pipeline_with(Arc::clone(&classifier));
        let mut folders = FolderStore::new();
        let mut incoming = vec![
            msg("dup1", "Meeting", "Agenda attached."),
            msg("dup1", "Different subject", "Different content entirely."),
        ];

        let report = pipeline.drain_incoming(&mut incoming, &mut folders);

        assert_eq!(report.duplicates, 1);
        assert_eq!(folders.inbox().len(), 1);
        assert_eq!(folders.inbox()[0].subject, "Meeting");
        assert!(folders.spam().is_empty());
        // the duplicate never reached the classifier
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_resubmission_is_idempotent() {
        let pipeline = pipeline();
        let mut folders = FolderStore::new();
        let mut incoming = vec![
            msg("a", "Meeting", "See you tomorrow."),
            msg("b", "Free money", "Click here."),
        ];
        pipeline.drain_incoming(&mut incoming, &mut folders);
        let before = folders.clone();

        let mut incoming = vec![
            msg("b", "Meeting", "Now I look legitimate."),
            msg("a", "Free prize", "Now I look like spam."),
        ];
        let report = pipeline.drain_incoming(&mut incoming, &mut folders);

        assert_eq!(report.duplicates, 2);
        assert_eq!(report.routed(), 0);
        assert_eq!(report.processed(), 2);
        assert_eq!(folders, before);
        assert!(incoming.is_empty());
    }

    #[test]
    fn test_messages_without_id_are_always_new() {
        let pipeline = pipeline();
        let mut folders = FolderStore::new();
        let mut incoming = vec![
            msg("", "Meeting", "Same content."),
            msg("", "Meeting", "Same content."),
        ];

        let report = pipeline.drain_incoming(&mut incoming, &mut folders);

        assert_eq!(report.inbox, 2);
        assert_eq!(report.duplicates, 0);
    }

    #[test]
    fn test_duplicate_of_manually_moved_message() {
        let pipeline = pipeline();
        let mut folders = FolderStore::new();
        let mut incoming = vec![msg("x", "Meeting", "Agenda.")];
        pipeline.drain_incoming(&mut incoming, &mut folders);
        folders.mark_spam("x");

        let mut incoming = vec![msg("x", "Meeting", "Agenda.")];
        pipeline.drain_incoming(&mut incoming, &mut folders);

        assert!(folders.inbox().is_empty());
        assert_eq!(folders.spam().len(), 1);
    }

    #[test]
    fn test_signal_failures_do_not_block_batch() {
        let pipeline = IntakePipeline::new(DecisionEngine::new(
            KeywordScanner::new(),
            Arc::new(FailingClassifier),
            Arc::new(FailingCorpus),
        ));
        let mut folders = FolderStore::new();
        let mut incoming = vec![
            msg("1", "Report", "Monthly numbers."),
            msg("2", "Urgente", "Transferencia pendiente."),
            msg("3", "Lunch", "Tomorrow at noon."),
        ];

        let report = pipeline.drain_incoming(&mut incoming, &mut folders);

        assert_eq!(
            report,
            IntakeReport {
                inbox: 2,
                spam: 1,
                duplicates: 0,
            }
        );
        assert_eq!(folders.inbox()[0].spam_score, 0.0);
        assert_eq!(
            folders.inbox()[0].spam_reason.as_deref(),
            Some("Parece legitimo")
        );
    }

    #[test]
    fn test_mutual_exclusivity_and_order() {
        let pipeline = pipeline();
        let mut folders = FolderStore::new();
        let mut incoming: Vec<NormalizedMessage> = (0..20)
            .map(|i| {
                let body = if i % 3 == 0 {
                    "free offer"
                } else {
                    "status update"
                };
                msg(&format!("id-{}", i % 12), "Weekly", body)
            })
            .collect();

        pipeline.drain_incoming(&mut incoming, &mut folders);

        for message in folders.inbox() {
            assert!(!folders.spam().iter().any(|m| m.id == message.id));
        }
        let all: Vec<&str> = folders
            .inbox()
            .iter()
            .chain(folders.spam())
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(all.len(), 12);
        assert_eq!(folders.inbox()[0].id, "id-1");
        assert_eq!(folders.spam()[0].id, "id-0");
    }

    #[test]
    fn test_mailroom_processes_queue() {
        let mut mailroom = Mailroom::new(pipeline());
        mailroom.enqueue(msg("a", "Meeting", "Tomorrow."));
        mailroom.enqueue_all(vec![
            msg("a", "Meeting", "Tomorrow."),
            msg("b", "Bono", "Gratis"),
        ]);
        assert_eq!(mailroom.pending(), 3);

        let report = mailroom.process_incoming();

        assert_eq!(report.processed(), 3);
        assert_eq!(mailroom.pending(), 0);
        assert_eq!(mailroom.folders().summary().total, 2);

        assert!(mailroom.folders_mut().mark_spam("a"));
        assert_eq!(mailroom.into_folders().spam().len(), 2);
    }
}
