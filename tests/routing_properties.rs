use crest::{Application, Method, Request, Response};
use proptest::prelude::*;

fn app() -> Application {
    let app = Application::new();
    app.get("/users/:id", |req: &Request, res: &mut Response| {
        res.send(req.param("id").unwrap_or("missing"));
    })
    .get("/static/*", |_: &Request, res: &mut Response| {
        res.send("static");
    });
    app
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_param_segment_is_captured(id in "[A-Za-z0-9_.~-]{1,24}") {
        let res = app().dispatch(Request::new(Method::GET, &format!("/users/{id}")));
        prop_assert_eq!(res.status_code(), 200);
        prop_assert_eq!(res.body(), id.as_bytes());
    }

    #[test]
    fn prop_extra_segment_is_not_found(id in "[a-z0-9]{1,8}", extra in "[a-z0-9]{1,8}") {
        let res = app().dispatch(Request::new(Method::GET, &format!("/users/{id}/{extra}")));
        prop_assert_eq!(res.status_code(), 404);
    }

    #[test]
    fn prop_wildcard_takes_any_tail(segments in prop::collection::vec("[a-z0-9.]{0,8}", 1..6)) {
        let path = format!("/static/{}", segments.join("/"));
        let res = app().dispatch(Request::new(Method::GET, &path));
        prop_assert_eq!(res.body(), b"static");
    }
}
