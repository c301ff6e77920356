// src/session.rs

use crate::controller::{IntakeController, IntakeState};
use crate::draft_cache::{DRAFT_KEY, LAST_EXTRACTION_KEY};
use crate::error::Action;
use crate::intake::{IntakeSource, SelectedFile};
use crate::record::Field;
use std::io::{self, Write};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::warn;

const HELP: &str = "\
commands:
  open <path>...          pick a file (only the first is used)
  drop <path>...          drop a file (only the first is used)
  set <field> <value>     edit a field
  show                    print the form
  preview                 print the preview area
  extract                 fill the form from the current file
  save                    save the record
  draft                   keep the form as a local draft
  restore [draft|last]    load the draft or the last extraction
  reset                   clear file, preview and form
  status                  show workflow state
  help | quit";

/// Outcome of one command line.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Read commands from `input` until it ends or `quit`, writing notices to `out`.
pub async fn run<R, W>(controller: &IntakeController, input: R, out: &mut W) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    writeln!(out, "{}", controller.preview())?;
    let mut lines = input.lines();
    loop {
        write!(out, "> ")?;
        out.flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if handle(controller, line.trim(), out).await? == Flow::Quit {
            break;
        }
    }
    writeln!(out)?;
    Ok(())
}

async fn handle<W: Write>(controller: &IntakeController, line: &str, out: &mut W) -> io::Result<Flow> {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    match command {
        "" => {}
        "open" | "drop" => {
            let source = if command == "open" {
                IntakeSource::Picker
            } else {
                IntakeSource::Drop
            };
            let mut files = Vec::new();
            for path in rest.split_whitespace() {
                match SelectedFile::read(path).await {
                    Ok(file) => files.push(file),
                    Err(e) => {
                        // Later paths must not stand in for an unreadable first one
                        warn!(path, error = %e, "Could not read file");
                        writeln!(out, "! Could not read {path}: {e}")?;
                        break;
                    }
                }
            }
            match controller.select_file(files, source).await {
                Some(_) => writeln!(out, "{}", controller.preview())?,
                None => writeln!(out, "! No file selected.")?,
            }
        }
        "set" => {
            let (name, value) = rest.split_once(' ').unwrap_or((rest, ""));
            match name.parse::<Field>() {
                Ok(field) => controller.set_field(field, value.trim().to_string()),
                Err(e) => writeln!(out, "! {e}")?,
            }
        }
        "show" => print_form(controller, out)?,
        "preview" => writeln!(out, "{}", controller.preview())?,
        "extract" => {
            writeln!(out, "Extracting…")?;
            match controller.extract().await {
                Ok(patch) => {
                    writeln!(out, "Extracted {} field(s).", patch.field_count())?;
                    print_form(controller, out)?;
                }
                Err(e) => writeln!(out, "! {e}")?,
            }
        }
        "save" => match controller.save().await {
            Ok(id) => writeln!(out, "Saved! Record id: {id}")?,
            Err(e) => writeln!(out, "! {e}")?,
        },
        "draft" => {
            controller.save_draft();
            writeln!(out, "Draft saved locally.")?;
        }
        "restore" => {
            let key = match rest {
                "" | "draft" => DRAFT_KEY,
                "last" => LAST_EXTRACTION_KEY,
                other => {
                    writeln!(out, "! Unknown snapshot '{other}' (use draft or last).")?;
                    return Ok(Flow::Continue);
                }
            };
            if controller.restore(key) {
                print_form(controller, out)?;
            } else {
                writeln!(out, "Nothing to restore.")?;
            }
        }
        "reset" => {
            controller.reset();
            writeln!(out, "{}", controller.preview())?;
        }
        "status" => print_status(controller, out)?,
        "help" => writeln!(out, "{HELP}")?,
        "quit" | "exit" => return Ok(Flow::Quit),
        other => writeln!(out, "! Unknown command '{other}'. Type help.")?,
    }
    Ok(Flow::Continue)
}

fn print_form<W: Write>(controller: &IntakeController, out: &mut W) -> io::Result<()> {
    let record = controller.record();
    writeln!(out, "  {:<15} {}", "file_name", record.file_name.as_deref().unwrap_or("-"))?;
    for field in Field::ALL {
        writeln!(out, "  {:<15} {}", field.name(), record.get(field))?;
    }
    Ok(())
}

fn print_status<W: Write>(controller: &IntakeController, out: &mut W) -> io::Result<()> {
    let status = controller.status();
    let state = match &status.state {
        IntakeState::Empty => "empty".to_string(),
        IntakeState::FilePreviewed => "file previewed".to_string(),
        IntakeState::Extracting => "extracting".to_string(),
        IntakeState::Populated => "populated".to_string(),
        IntakeState::Saving => "saving".to_string(),
        IntakeState::Idle { saved_id: Some(id) } => format!("idle (saved as {id})"),
        IntakeState::Idle { saved_id: None } => "idle".to_string(),
    };
    writeln!(out, "  state    {state}")?;
    match &status.file {
        Some((name, kind)) => writeln!(out, "  file     {name} ({kind:?})")?,
        None => writeln!(out, "  file     -")?,
    }
    for action in [Action::Extract, Action::Save] {
        let control = if controller.is_busy(action) { "running" } else { "ready" };
        writeln!(out, "  {:<8} {control}", action.to_string().to_lowercase())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft_cache::{DraftCache, MemoryStore};
    use crate::error::IntakeError;
    use crate::fields::FormFields;
    use crate::intake::FileHandle;
    use crate::record::{InvoicePatch, InvoiceRecord, RecordId};
    use crate::remote::{ExtractionClient, SaveClient};
    use async_trait::async_trait;

    struct CannedExtractor(Result<InvoicePatch, (u16, &'static str)>);

    #[async_trait]
    impl ExtractionClient for CannedExtractor {
        async fn extract(&self, _file: &FileHandle, _notes: &str) -> Result<InvoicePatch, IntakeError> {
            self.0.clone().map_err(|(status, message)| IntakeError::Transport {
                status: Some(status),
                message: message.to_string(),
            })
        }
    }

    struct CannedSaver(&'static str);

    #[async_trait]
    impl SaveClient for CannedSaver {
        async fn save(&self, _record: &InvoiceRecord) -> Result<RecordId, IntakeError> {
            Ok(RecordId(self.0.to_string()))
        }
    }

    fn controller(extractor: CannedExtractor) -> IntakeController {
        IntakeController::new(
            Box::new(FormFields::new()),
            DraftCache::new(Box::new(MemoryStore::new())),
            Box::new(extractor),
            Box::new(CannedSaver("INV-1")),
        )
    }

    async fn transcript(controller: &IntakeController, script: &str) -> String {
        let mut out = Vec::new();
        run(controller, script.as_bytes(), &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_extract_and_save_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("factuur.txt");
        std::fs::write(&path, "invoice").unwrap();

        let c = controller(CannedExtractor(Ok(InvoicePatch {
            supplier: Some("Acme BV".into()),
            invoice_amount: Some("123.45".into()),
            ..Default::default()
        })));
        let script = format!("open {}\nset kvk 12345678\nextract\nsave\nstatus\nquit\n", path.display());
        let out = transcript(&c, &script).await;

        assert!(out.contains("📄 factuur.txt"));
        assert!(out.contains("Extracted 2 field(s)."));
        assert!(out.contains("Saved! Record id: INV-1"));
        assert!(out.contains("idle (saved as INV-1)"));
        let record = c.record();
        assert_eq!(record.supplier, "Acme BV");
        assert_eq!(record.kvk, "12345678");
    }

    #[tokio::test]
    async fn test_extract_error_is_shown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.txt");
        std::fs::write(&path, "x").unwrap();

        let c = controller(CannedExtractor(Err((500, "bad file"))));
        let out = transcript(&c, &format!("drop {}\nextract\n", path.display())).await;

        assert!(out.contains("! bad file"));
        assert!(!c.is_busy(Action::Extract));
    }

    #[tokio::test]
    async fn test_extract_without_file() {
        let c = controller(CannedExtractor(Ok(InvoicePatch::default())));
        let out = transcript(&c, "extract\n").await;
        assert!(out.contains("! Please select a file first."));
    }

    #[tokio::test]
    async fn test_draft_restore_and_reset() {
        let c = controller(CannedExtractor(Ok(InvoicePatch::default())));
        let out = transcript(
            &c,
            "set supplier Draft BV\ndraft\nreset\nrestore\nrestore last\nrestore later\n",
        )
        .await;

        assert!(out.contains("Draft saved locally."));
        assert!(out.contains("Nothing to restore."));
        assert!(out.contains("! Unknown snapshot 'later'"));
        assert_eq!(c.record().supplier, "Draft BV");
    }

    #[tokio::test]
    async fn test_bad_input_is_reported() {
        let c = controller(CannedExtractor(Ok(InvoicePatch::default())));
        let out = transcript(&c, "set total 12\nfrobnicate\nopen /no/such/file.pdf\n").await;

        assert!(out.contains("! unknown field 'total'"));
        assert!(out.contains("! Unknown command 'frobnicate'"));
        assert!(out.contains("! Could not read /no/such/file.pdf"));
        assert!(out.contains("! No file selected."));
    }

    #[tokio::test]
    async fn test_unreadable_first_path_selects_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("second.pdf");
        std::fs::write(&path, "x").unwrap();

        let c = controller(CannedExtractor(Ok(InvoicePatch::default())));
        let out = transcript(&c, &format!("drop /no/such/first.pdf {}
", path.display())).await;

        assert!(out.contains("! Could not read /no/such/first.pdf"));
        assert!(out.contains("! No file selected."));
        assert_eq!(c.status().file, None);
        assert_eq!(c.state(), IntakeState::Empty);
    }
}
