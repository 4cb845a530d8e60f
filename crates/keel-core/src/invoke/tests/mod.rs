use std::sync::Arc;

use crate::invoke::{
    DispatchTable, FnOperation, InvokeArgs, InvokeError, InvokeReturn, Signature,
};
use crate::service::Service;

struct Greeter {
    prefix: String,
}

fn greet_table() -> DispatchTable {
    DispatchTable::new().with_operation(
        Signature::new("greet", ["String"]),
        Arc::new(FnOperation::new(|greeter: &Greeter, mut args: InvokeArgs| {
            let who = args
                .pop()
                .and_then(|arg| arg.downcast::<String>().ok())
                .ok_or(InvokeError::BadArguments {
                    reason: "greet takes one String".to_string(),
                })?;
            let out: InvokeReturn = Box::new(format!("{}{}", greeter.prefix, who));
            Ok(out)
        })),
    )
}

#[test]
fn signature_display_includes_parameters() {
    assert_eq!(Signature::nullary("ping").to_string(), "ping()");
    assert_eq!(
        Signature::new("greet", ["String", "u32"]).to_string(),
        "greet(String,u32)"
    );
}

#[test]
fn signatures_with_different_parameters_are_distinct() {
    let unary = Signature::new("greet", ["String"]);
    assert_ne!(unary, Signature::nullary("greet"));
    assert_eq!(unary, Signature::new("greet", ["String"]));
}

#[test]
fn dispatch_table_resolves_by_signature() {
    let table = greet_table();
    assert_eq!(table.len(), 1);
    assert!(table.get(&Signature::new("greet", ["String"])).is_some());
    assert!(table.get(&Signature::nullary("greet")).is_none());
}

#[tokio::test]
async fn fn_operation_downcasts_and_runs() {
    let table = greet_table();
    let invoker = table.get(&Signature::new("greet", ["String"])).unwrap();
    let service: Service = Arc::new(Greeter {
        prefix: "hello ".to_string(),
    });

    let args: InvokeArgs = vec![Box::new("keel".to_string())];
    let result = invoker.invoke(&service, args).await.unwrap();
    assert_eq!(*result.downcast::<String>().unwrap(), "hello keel");
}

#[tokio::test]
async fn fn_operation_rejects_wrong_service_type() {
    let table = greet_table();
    let invoker = table.get(&Signature::new("greet", ["String"])).unwrap();
    let service: Service = Arc::new(42u32);

    let error = invoker.invoke(&service, Vec::new()).await.unwrap_err();
    assert!(matches!(error, InvokeError::WrongService { .. }));
}

#[tokio::test]
async fn fn_operation_reports_bad_arguments() {
    let table = greet_table();
    let invoker = table.get(&Signature::new("greet", ["String"])).unwrap();
    let service: Service = Arc::new(Greeter {
        prefix: String::new(),
    });

    let args: InvokeArgs = vec![Box::new(7u64)];
    let error = invoker.invoke(&service, args).await.unwrap_err();
    assert!(matches!(error, InvokeError::BadArguments { .. }));
}
