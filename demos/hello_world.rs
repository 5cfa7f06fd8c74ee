//! A minimal "Hello, World!" server using Crest
//!
//! Run it and try `curl -i http://127.0.0.1:3000/`.

use crest::{Application, Request, Response};

fn main() {
    let app = Application::new();
    crest::logging::init(&app.config().middleware);

    app.get("/", |_: &Request, res: &mut Response| {
        res.text("Hello, World!");
    });

    if let Err(e) = app.listen() {
        eprintln!("server failed: {e}");
        std::process::exit(1);
    }
}
