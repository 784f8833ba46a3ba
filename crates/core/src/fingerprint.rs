//! Content fingerprinting for quiz question sets.
//!
//! The fingerprint detects server-side content drift between the question
//! set a session was started against and the one the backend serves now:
//! additions, removals, reorderings, and prompt edits all change it. It only
//! needs to be stable and fast, not cryptographic, so a multiply-by-31
//! rolling hash over a canonical encoding is enough. The output format is
//! not a compatibility surface; stored fingerprints are only ever compared
//! against freshly computed ones.

use std::fmt::Write as _;

use crate::model::{Question, SessionRecord};

/// Compute the order-sensitive fingerprint of a question set.
#[must_use]
pub fn fingerprint(questions: &[Question]) -> String {
    let mut canonical = String::new();
    for question in questions {
        // "write!" to a String cannot fail.
        let _ = write!(
            canonical,
            "{}|{}|{}|{};",
            question.id.value(),
            question.kind.as_str(),
            question.prompt,
            question.position,
        );
    }

    let mut hash: u64 = 0;
    for byte in canonical.bytes() {
        hash = hash.wrapping_mul(31).wrapping_add(u64::from(byte));
    }
    to_base36(hash)
}

/// True if the record's stored fingerprint no longer matches the live
/// question set.
///
/// A record with no stored fingerprint has simply never observed one; that
/// is a bootstrap, not a change, and the caller is expected to store the
/// freshly computed value.
#[must_use]
pub fn has_changed(record: &SessionRecord, questions: &[Question]) -> bool {
    match record.fingerprint.as_deref() {
        Some(stored) => stored != fingerprint(questions),
        None => false,
    }
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".into();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    // All digits are ASCII, so this cannot fail.
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OptionId, QuestionId, QuestionKind, QuestionOption};
    use crate::time::fixed_now;

    fn question(id: u64, prompt: &str, position: u32) -> Question {
        Question {
            id: QuestionId::new(id),
            kind: QuestionKind::MultipleChoice,
            prompt: prompt.into(),
            options: vec![QuestionOption {
                id: OptionId::new(1),
                text: "A".into(),
            }],
            position,
        }
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let questions = vec![question(1, "What is 2+2?", 0), question(2, "What is 3+3?", 1)];
        assert_eq!(fingerprint(&questions), fingerprint(&questions));
    }

    #[test]
    fn fingerprint_changes_on_prompt_edit() {
        let before = vec![question(1, "What is 2+2?", 0)];
        let after = vec![question(1, "What is 2+3?", 0)];
        assert_ne!(fingerprint(&before), fingerprint(&after));
    }

    #[test]
    fn fingerprint_changes_on_reorder() {
        let before = vec![question(1, "A", 0), question(2, "B", 1)];
        let after = vec![question(1, "A", 1), question(2, "B", 0)];
        assert_ne!(fingerprint(&before), fingerprint(&after));
    }

    #[test]
    fn fingerprint_changes_on_added_question() {
        let before = vec![question(1, "A", 0)];
        let after = vec![question(1, "A", 0), question(2, "B", 1)];
        assert_ne!(fingerprint(&before), fingerprint(&after));
    }

    #[test]
    fn has_changed_bootstraps_without_stored_fingerprint() {
        let record = SessionRecord::fresh(fixed_now());
        let questions = vec![question(1, "A", 0)];
        assert!(!has_changed(&record, &questions));
    }

    #[test]
    fn has_changed_detects_drift() {
        let questions = vec![question(1, "A", 0)];
        let mut record = SessionRecord::fresh(fixed_now());
        record.fingerprint = Some(fingerprint(&questions));
        assert!(!has_changed(&record, &questions));

        let edited = vec![question(1, "A'", 0)];
        assert!(has_changed(&record, &edited));
    }
}
