use std::path::{Path, PathBuf};

use crate::error::SessionError;
use crate::export;
use crate::overlay::Mark;

// ── Data Model ──────────────────────────────────────────────────────────────

/// A committed annotation, in image pixel coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    PendingClick,
}

/// Committed points and their marks. Both vectors are only touched by
/// `push` and `pop`, so `points[i]` is always drawn by `marks[i]`.
#[derive(Debug, Default)]
struct Ledger {
    points: Vec<Point>,
    marks: Vec<Mark>,
}

impl Ledger {
    fn push(&mut self, point: Point) {
        self.marks.push(Mark::committed(&point.id, point.x, point.y));
        self.points.push(point);
    }

    fn pop(&mut self) -> Option<Point> {
        let point = self.points.pop()?;
        self.marks.pop();
        Some(point)
    }

    fn contains_id(&self, id: &str) -> bool {
        self.points.iter().any(|p| p.id == id)
    }
}

// ── Session ─────────────────────────────────────────────────────────────────

/// One annotation session against one image and one output file.
#[derive(Debug)]
pub struct Session {
    image_size: (f64, f64),
    output: PathBuf,
    ledger: Ledger,
    pending: Option<(Point2, Mark)>,
    next_id: i64,
    id_input: String,
}

type Point2 = (f64, f64);

impl Session {
    pub fn new(image_size: (f64, f64), output: impl Into<PathBuf>, start_id: i64) -> Self {
        Self {
            image_size,
            output: output.into(),
            ledger: Ledger::default(),
            pending: None,
            next_id: start_id,
            id_input: start_id.to_string(),
        }
    }

    pub fn phase(&self) -> Phase {
        if self.pending.is_some() {
            Phase::PendingClick
        } else {
            Phase::Idle
        }
    }

    pub fn points(&self) -> &[Point] {
        &self.ledger.points
    }

    pub fn pending(&self) -> Option<(f64, f64)> {
        self.pending.as_ref().map(|(at, _)| *at)
    }

    pub fn next_id(&self) -> i64 {
        self.next_id
    }

    pub fn id_input(&self) -> &str {
        &self.id_input
    }

    /// The identifier field, editable by the UI.
    pub fn id_input_mut(&mut self) -> &mut String {
        &mut self.id_input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Committed marks in commit order, then the provisional mark if any.
    pub fn marks(&self) -> impl Iterator<Item = &Mark> {
        self.ledger
            .marks
            .iter()
            .chain(self.pending.as_ref().map(|(_, m)| m))
    }

    /// Record a click as the pending click, replacing any previous one.
    /// Pixel centres sit on whole numbers, so the image covers
    /// `[-0.5, w - 0.5) x [-0.5, h - 0.5)`; clicks outside it are ignored
    /// and return `false`.
    pub fn register_click(&mut self, x: f64, y: f64) -> bool {
        let (w, h) = self.image_size;
        if !(-0.5..w - 0.5).contains(&x) || !(-0.5..h - 0.5).contains(&y) {
            return false;
        }
        self.pending = Some(((x, y), Mark::pending(x, y)));
        true
    }

    /// Turn the pending click and the identifier field into a committed
    /// point. On any error the session is left untouched.
    pub fn commit(&mut self) -> Result<Point, SessionError> {
        let Some(((x, y), _)) = self.pending else {
            return Err(SessionError::NoPendingClick);
        };
        let id = self.id_input.trim();
        if id.is_empty() {
            return Err(SessionError::EmptyId);
        }
        if self.ledger.contains_id(id) {
            return Err(SessionError::DuplicateId(id.to_string()));
        }

        let point = Point {
            id: id.to_string(),
            x,
            y,
        };
        self.ledger.push(point.clone());
        self.pending = None;

        if let Some(next) = id.parse::<i64>().ok().and_then(|n| n.checked_add(1)) {
            self.next_id = next;
            self.id_input = next.to_string();
        }
        Ok(point)
    }

    /// Remove the most recently committed point and its mark.
    pub fn undo(&mut self) -> Option<Point> {
        self.ledger.pop()
    }

    /// Write all committed points to the output file, returning its
    /// absolute path. Session state is never changed.
    pub fn export(&self) -> Result<PathBuf, SessionError> {
        if self.ledger.points.is_empty() {
            return Err(SessionError::NothingToExport);
        }
        let contents = export::encode(&self.ledger.points);
        export::write_atomic(&self.output, &contents).map_err(|source| SessionError::Export {
            path: self.output.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new((640.0, 480.0), "points.csv", 1)
    }

    fn add(s: &mut Session, id: &str, x: f64, y: f64) -> Result<Point, SessionError> {
        assert!(s.register_click(x, y));
        *s.id_input_mut() = id.to_string();
        s.commit()
    }

    #[test]
    fn test_new_session_is_idle() {
        let s = Session::new((10.0, 10.0), "out.csv", 7);
        assert_eq!(s.phase(), Phase::Idle);
        assert!(s.points().is_empty());
        assert_eq!(s.next_id(), 7);
        assert_eq!(s.id_input(), "7");
        assert_eq!(s.marks().count(), 0);
    }

    #[test]
    fn test_click_replaces_pending() {
        let mut s = session();
        assert!(s.register_click(1.0, 2.0));
        assert!(s.register_click(3.0, 4.0));
        assert_eq!(s.phase(), Phase::PendingClick);
        assert_eq!(s.pending(), Some((3.0, 4.0)));
        assert_eq!(s.marks().count(), 1);
    }

    #[test]
    fn test_click_outside_image_ignored() {
        let mut s = session();
        assert!(s.register_click(5.0, 5.0));
        assert!(!s.register_click(-1.0, 5.0));
        assert!(!s.register_click(5.0, 480.0));
        assert!(!s.register_click(5.0, 479.5));
        assert!(!s.register_click(700.0, 10.0));
        assert_eq!(s.pending(), Some((5.0, 5.0)));
    }

    #[test]
    fn test_click_on_pixel_edges() {
        let mut s = session();
        assert!(s.register_click(-0.5, -0.5));
        assert!(s.register_click(639.4, 479.4));
        assert_eq!(s.pending(), Some((639.4, 479.4)));
    }

    #[test]
    fn test_commit_without_click() {
        let mut s = session();
        assert!(matches!(s.commit(), Err(SessionError::NoPendingClick)));
        assert!(s.points().is_empty());
    }

    #[test]
    fn test_commit_empty_id_keeps_pending() {
        let mut s = session();
        s.register_click(1.0, 1.0);
        *s.id_input_mut() = "   ".to_string();
        assert!(matches!(s.commit(), Err(SessionError::EmptyId)));
        assert_eq!(s.phase(), Phase::PendingClick);
        assert!(s.points().is_empty());
    }

    #[test]
    fn test_commit_trims_id_and_increments() {
        let mut s = session();
        let p = add(&mut s, " 5 ", 10.0, 20.0).unwrap();
        assert_eq!(p.id, "5");
        assert_eq!(s.next_id(), 6);
        assert_eq!(s.id_input(), "6");
        assert_eq!(s.phase(), Phase::Idle);
        assert_eq!(s.pending(), None);
    }

    #[test]
    fn test_non_numeric_id_leaves_suggestion() {
        let mut s = session();
        add(&mut s, "A1", 10.0, 20.0).unwrap();
        assert_eq!(s.next_id(), 1);
        assert_eq!(s.id_input(), "A1");
    }

    #[test]
    fn test_overflowing_id_leaves_suggestion() {
        let mut s = session();
        add(&mut s, &i64::MAX.to_string(), 1.0, 1.0).unwrap();
        assert_eq!(s.next_id(), 1);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut s = session();
        add(&mut s, "1", 100.0, 200.0).unwrap();
        let err = add(&mut s, "1", 150.0, 250.0).unwrap_err();
        assert!(matches!(err, SessionError::DuplicateId(ref id) if id == "1"));
        assert_eq!(err.to_string(), "Duplicate ID: 1");
        assert_eq!(s.points().len(), 1);
        assert_eq!(s.phase(), Phase::PendingClick);
    }

    #[test]
    fn test_distinct_commits_keep_order() {
        let mut s = session();
        for (i, id) in ["3", "b", "x-1", "4"].iter().enumerate() {
            add(&mut s, id, i as f64, i as f64).unwrap();
        }
        let ids: Vec<&str> = s.points().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["3", "b", "x-1", "4"]);
    }

    #[test]
    fn test_undo_is_lifo_and_keeps_marks_in_step() {
        let mut s = session();
        add(&mut s, "1", 1.0, 1.0).unwrap();
        add(&mut s, "2", 2.0, 2.0).unwrap();
        s.register_click(9.0, 9.0);

        assert_eq!(s.undo().map(|p| p.id), Some("2".to_string()));
        assert_eq!(s.points().len(), 1);
        assert_eq!(s.ledger.marks.len(), s.ledger.points.len());
        assert_eq!(s.ledger.marks[0].label, "1");
        // pending click and suggestion untouched
        assert_eq!(s.pending(), Some((9.0, 9.0)));
        assert_eq!(s.id_input(), "3");
    }

    #[test]
    fn test_undo_empty_is_noop() {
        let mut s = session();
        assert_eq!(s.undo(), None);
        assert!(s.points().is_empty());
    }

    #[test]
    fn test_export_empty_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.csv");
        let s = Session::new((10.0, 10.0), &path, 1);
        assert!(matches!(s.export(), Err(SessionError::NothingToExport)));
        assert!(!path.exists());
    }

    #[test]
    fn test_export_unwritable_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("p.csv");
        let mut s = Session::new((10.0, 10.0), &path, 1);
        add(&mut s, "1", 1.0, 2.0).unwrap();
        assert!(matches!(s.export(), Err(SessionError::Export { .. })));
        assert_eq!(s.points().len(), 1);
    }

    #[test]
    fn test_export_line_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.csv");
        let mut s = Session::new((500.0, 500.0), &path, 1);
        for i in 1..=4 {
            add(&mut s, &i.to_string(), i as f64 * 10.0, 5.0).unwrap();
        }
        let written = s.export().unwrap();
        let text = std::fs::read_to_string(written).unwrap();
        assert_eq!(text.lines().count(), 1 + s.points().len());
        assert_eq!(text.lines().nth(4), Some("4,40.0,5.0"));
    }
}
