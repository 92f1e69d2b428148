use std::sync::{Arc, Mutex};

use etude_core::{from_fn, interceptor, Config, EtudeError, Handler, Interceptor, Router, TestClient};

type Trace = Arc<Mutex<Vec<String>>>;

fn quiet() -> Config {
    Config {
        print_routes: false,
        ..Config::default()
    }
}

fn tracer(trace: Trace, name: &'static str) -> Interceptor {
    from_fn(move |ctx, next| {
        let trace = trace.clone();
        Box::pin(async move {
            trace.lock().unwrap().push(format!("{}-before", name));
            let result = next(ctx).await;
            trace.lock().unwrap().push(format!("{}-after", name));
            result
        })
    })
}

#[tokio::test]
async fn test_two_interceptors_run_in_registration_order() {
    let trace: Trace = Arc::default();
    let mut router = Router::new(quiet());
    router.use_middleware(tracer(trace.clone(), "A"));
    router.use_middleware(tracer(trace.clone(), "B"));

    let inner = trace.clone();
    router.get("/", move |ctx| {
        let inner = inner.clone();
        Box::pin(async move {
            inner.lock().unwrap().push("handler".to_string());
            ctx.send_string("ok")
        })
    });

    let res = TestClient::new(router.build()).get("/").await;
    assert_eq!(res.body, "ok");
    assert_eq!(
        *trace.lock().unwrap(),
        vec!["A-before", "B-before", "handler", "B-after", "A-after"]
    );
}

#[tokio::test]
async fn test_three_interceptors_trace() {
    let trace: Trace = Arc::default();
    let mut router = Router::new(quiet());
    for n in 1..=3 {
        let trace = trace.clone();
        router.use_fn(move |ctx, next| {
            let trace = trace.clone();
            Box::pin(async move {
                trace.lock().unwrap().push(format!("enter-{}", n));
                let result = next(ctx).await;
                trace.lock().unwrap().push(format!("exit-{}", n));
                result
            })
        });
    }
    router.get("/", |ctx| Box::pin(async move { ctx.send_string("ok") }));

    let res = TestClient::new(router.build()).get("/").await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body, "ok");
    assert_eq!(
        *trace.lock().unwrap(),
        vec!["enter-1", "enter-2", "enter-3", "exit-3", "exit-2", "exit-1"]
    );
}

#[tokio::test]
async fn test_middleware_wraps_not_found() {
    let trace: Trace = Arc::default();
    let mut router = Router::new(quiet());
    router.use_middleware(tracer(trace.clone(), "log"));

    let res = TestClient::new(router.build()).get("/missing").await;
    assert_eq!(res.status, 404);
    assert_eq!(*trace.lock().unwrap(), vec!["log-before", "log-after"]);
}

#[tokio::test]
async fn test_short_circuit() {
    let mut router = Router::new(quiet());
    router.use_fn(|ctx, next| {
        Box::pin(async move {
            if ctx.header("authorization").is_none() {
                return ctx.status(401).send_string("unauthorized");
            }
            next(ctx).await
        })
    });
    router.get("/secret", |ctx| Box::pin(async move { ctx.send_string("secret") }));
    let client = TestClient::new(router.build());

    let res = client.get("/secret").await;
    assert_eq!(res.status, 401);
    assert_eq!(res.body, "unauthorized");

    let req = hyper::Request::builder()
        .uri("/secret")
        .header("authorization", "Bearer t")
        .body(http_body_util::Full::new(bytes::Bytes::new()))
        .unwrap();
    assert_eq!(client.request(req).await.body, "secret");
}

#[tokio::test]
async fn test_headers_set_before_next_survive() {
    let mut router = Router::new(quiet());
    router.use_fn(|ctx, next| {
        Box::pin(async move {
            ctx.set_header("x-request-id", "abc123")?;
            next(ctx).await
        })
    });
    router.get("/", |ctx| Box::pin(async move { ctx.send_string("ok") }));

    let res = TestClient::new(router.build()).get("/").await;
    assert_eq!(res.header("x-request-id"), Some("abc123"));
}

#[tokio::test]
async fn test_header_after_next_is_rejected() {
    let observed = Arc::new(Mutex::new(None));
    let slot = observed.clone();
    let mut router = Router::new(quiet());
    router.use_fn(move |ctx, next| {
        let slot = slot.clone();
        Box::pin(async move {
            next(ctx).await?;
            let late = ctx.set_header("x-late", "1");
            *slot.lock().unwrap() = Some(matches!(late, Err(EtudeError::AlreadyWritten)));
            Ok(())
        })
    });
    router.get("/", |ctx| Box::pin(async move { ctx.send_string("ok") }));

    let res = TestClient::new(router.build()).get("/").await;
    assert_eq!(res.status, 200);
    assert!(res.header("x-late").is_none());
    assert_eq!(*observed.lock().unwrap(), Some(true));
}

#[tokio::test]
async fn test_handler_error_becomes_500() {
    let mut router = Router::new(quiet());
    router.get("/fail", |_ctx| Box::pin(async move { Err(EtudeError::msg("database unavailable")) }));

    let res = TestClient::new(router.build()).get("/fail").await;
    assert_eq!(res.status, 500);
    assert_eq!(res.body, "database unavailable");
}

#[tokio::test]
async fn test_middleware_sees_handler_error() {
    let seen = Arc::new(Mutex::new(String::new()));
    let slot = seen.clone();
    let mut router = Router::new(quiet());
    router.use_fn(move |ctx, next| {
        let slot = slot.clone();
        Box::pin(async move {
            let result = next(ctx).await;
            if let Err(e) = &result {
                *slot.lock().unwrap() = e.to_string();
            }
            result
        })
    });
    router.get("/fail", |_ctx| Box::pin(async move { Err(EtudeError::msg("boom")) }));

    let res = TestClient::new(router.build()).get("/fail").await;
    assert_eq!(res.status, 500);
    assert_eq!(*seen.lock().unwrap(), "boom");
}

#[tokio::test]
async fn test_error_after_write_keeps_response() {
    let mut router = Router::new(quiet());
    router.get("/partial", |ctx| {
        Box::pin(async move {
            ctx.status(202).send_string("accepted")?;
            Err(EtudeError::msg("cleanup failed"))
        })
    });

    let res = TestClient::new(router.build()).get("/partial").await;
    assert_eq!(res.status, 202);
    assert_eq!(res.body, "accepted");
}

#[tokio::test]
async fn test_plain_interceptor() {
    let mut router = Router::new(quiet());
    router.use_middleware(interceptor(|next: Handler| {
        etude_core::handler(move |ctx| {
            let next = next.clone();
            Box::pin(async move {
                let result = next(ctx).await;
                if ctx.response_status().as_u16() == 404 {
                    ctx.set_header("x-miss", "1").ok();
                }
                result
            })
        })
    }));
    router.get("/", |ctx| Box::pin(async move { ctx.status(404).send_string("gone") }));

    let res = TestClient::new(router.build()).get("/").await;
    assert_eq!(res.status, 404);
    // Written responses no longer accept headers.
    assert!(res.header("x-miss").is_none());
}
