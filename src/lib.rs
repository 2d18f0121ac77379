// Library root
// -----------
// This crate exposes the library surface for the `copydesk` CLI. The binary
// (`main.rs`) wires the real clients together and hands them to the
// orchestrator.
//
// Module responsibilities:
// - `config`: Environment configuration (`.env` honoured).
// - `error`: The crate's error taxonomy.
// - `google`: Sheets, Docs and Drive clients behind one service account.
// - `source`: Reads the tracking spreadsheet into publish candidates.
// - `document`: Splits a story document into its marked sections.
// - `options`: Shared headline and cutline option documents.
// - `image`: Featured image fetch, validation and retried upload.
// - `publisher` / `wordpress`: Author, category, media and post creation.
// - `review`: Keypress decisions and operator prompts.
// - `orchestrator`: The per-row loop.
// - `summary` / `console`: What the operator sees.
//
// Every external system sits behind a trait (`SheetSource`,
// `DocumentSource`, `ImageSource`, `PublishTarget`, `KeySource`,
// `Prompter`) so the whole loop can run against fakes in tests.
pub mod config;
pub mod console;
pub mod document;
pub mod error;
pub mod google;
pub mod image;
pub mod options;
pub mod orchestrator;
pub mod publisher;
pub mod review;
pub mod source;
pub mod summary;
pub mod wordpress;
