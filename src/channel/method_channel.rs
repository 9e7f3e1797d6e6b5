use std::{
    collections::HashMap,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use log::{error, trace, warn};
use parking_lot::RwLock;

use crate::{
    channel::{panic_message, HandlerResult},
    codec::{MethodCall, MethodCallResult, MethodCodec, Value},
    error::MethodCallError,
    messenger::{BinaryMessenger, ChannelHandlerResult},
};

/// A unit of work processing one inbound call for a method name.
///
/// Handlers are invoked straight from the dispatch path, possibly from
/// several threads at once; a handler that needs serialization brings its
/// own. Any `Fn` with the right shape is a handler, so closures can be
/// registered directly through [`MethodChannel::handle_fn`].
pub trait MethodHandler: Send + Sync {
    fn handle_method(&self, arguments: Value) -> HandlerResult;
}

impl<F> MethodHandler for F
where
    F: Fn(Value) -> HandlerResult + Send + Sync,
{
    fn handle_method(&self, arguments: Value) -> HandlerResult {
        self(arguments)
    }
}

/// A named, bidirectional conduit for method calls.
///
/// The channel registers itself with the messenger at construction and stays
/// registered for the life of the process. Method handlers live in a
/// per-name registry; reads during dispatch share the lock, registration
/// takes it exclusively for the map mutation only.
pub struct MethodChannel {
    name: String,
    messenger: Arc<dyn BinaryMessenger>,
    codec: &'static dyn MethodCodec,
    methods: RwLock<HashMap<String, Arc<dyn MethodHandler>>>,
}

impl MethodChannel {
    pub fn new<N>(
        messenger: Arc<dyn BinaryMessenger>,
        name: N,
        codec: &'static dyn MethodCodec,
    ) -> Arc<Self>
    where
        N: AsRef<str>,
    {
        let channel = Arc::new(Self {
            name: name.as_ref().to_owned(),
            messenger,
            codec,
            methods: RwLock::new(HashMap::new()),
        });
        let dispatcher = Arc::clone(&channel);
        channel.messenger.set_channel_handler(
            &channel.name,
            Arc::new(move |message: &[u8]| dispatcher.dispatch(message)),
        );
        channel
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a handler for `method`, replacing any existing registration.
    pub fn handle<H>(&self, method: &str, handler: H)
    where
        H: MethodHandler + 'static,
    {
        self.methods
            .write()
            .insert(method.to_owned(), Arc::new(handler));
    }

    /// Shorthand for registering a plain closure as the handler.
    pub fn handle_fn<F>(&self, method: &str, f: F)
    where
        F: Fn(Value) -> HandlerResult + Send + Sync + 'static,
    {
        self.handle(method, f);
    }

    /// Drop the registration for `method`. Removing an absent registration
    /// is a no-op; calls for the name are then answered with an empty reply.
    pub fn unregister(&self, method: &str) {
        self.methods.write().remove(method);
    }

    /// Invoke a method on the remote side of this channel and block until
    /// its reply envelope arrives.
    ///
    /// A structured error reported by the remote handler comes back as
    /// [`MethodCallError::CustomError`]; an empty reply (no handler over
    /// there) as [`MethodCallError::NotImplemented`]. Timeouts, if wanted,
    /// are the transport's or the caller's business.
    pub fn invoke_method<M>(&self, method: M, arguments: Value) -> Result<Value, MethodCallError>
    where
        M: Into<String>,
    {
        let call = MethodCall {
            method: method.into(),
            args: arguments,
        };
        let message = self
            .codec
            .encode_method_call(&call)
            .map_err(MethodCallError::EncodeError)?;
        let reply = self
            .messenger
            .send(&self.name, &message)
            .map_err(MethodCallError::SendError)?;
        match self
            .codec
            .decode_envelope(&reply)
            .map_err(MethodCallError::DecodeError)?
        {
            MethodCallResult::Ok(value) => Ok(value),
            MethodCallResult::Err {
                code,
                message,
                details,
            } => Err(MethodCallError::CustomError {
                code,
                message,
                details,
            }),
            MethodCallResult::NotImplemented => Err(MethodCallError::NotImplemented),
        }
    }

    /// Handle one inbound message: decode the call, run its handler, encode
    /// the outcome.
    fn dispatch(&self, message: &[u8]) -> ChannelHandlerResult {
        let call = self
            .codec
            .decode_method_call(message)
            .map_err(MethodCallError::DecodeError)?;
        trace!(
            "on channel '{}', got method call '{}'",
            self.name,
            call.method
        );

        let handler = self.methods.read().get(&call.method).cloned();
        let handler = match handler {
            Some(handler) => handler,
            None => {
                warn!(
                    "no method handler registered for method '{}' on channel '{}'",
                    call.method, self.name
                );
                return Ok(None);
            }
        };

        let MethodCall { method, args } = call;
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| handler.handle_method(args))) {
            Ok(outcome) => outcome,
            Err(cause) => {
                error!(
                    "recovered from panic while handling call for method '{}' on channel '{}': {}",
                    method,
                    self.name,
                    panic_message(&*cause)
                );
                return Ok(None);
            }
        };

        match outcome {
            Ok(value) => {
                let reply = self
                    .codec
                    .encode_success_envelope(&value)
                    .map_err(MethodCallError::EncodeError)?;
                Ok(Some(reply))
            }
            Err(err) => {
                error!(
                    "handler for method '{}' on channel '{}' returned an error: {}",
                    method, self.name, err
                );
                let reply = self
                    .codec
                    .encode_error_envelope("error", &err.to_string(), &Value::Null)
                    .map_err(MethodCallError::EncodeError)?;
                Ok(Some(reply))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;
    use crate::{
        codec::{JSON_CODEC, STANDARD_CODEC},
        error::MessengerError,
        messenger::InProcessMessenger,
    };

    fn channel_on_loopback(name: &str) -> Arc<MethodChannel> {
        let _ = env_logger::builder().is_test(true).try_init();
        MethodChannel::new(InProcessMessenger::loopback(), name, &JSON_CODEC)
    }

    #[test]
    fn test_echo_invocation() {
        let channel = channel_on_loopback("test/echo");
        channel.handle_fn("echo", |args| Ok(args));

        let reply = channel
            .invoke_method("echo", json_value!("hi"))
            .expect("invocation failed");
        assert_eq!(reply, Value::String("hi".into()));
    }

    #[test]
    fn test_handler_error_comes_back_structured() {
        let channel = channel_on_loopback("test/fail");
        channel.handle_fn("fail", |_| Err("boom".into()));

        match channel.invoke_method("fail", Value::Null) {
            Err(MethodCallError::CustomError { code, message, .. }) => {
                assert_eq!(code, "error");
                assert_eq!(message, "boom");
            }
            other => panic!("expected a structured error, got {:?}", other),
        }
    }

    #[test]
    fn test_unregistered_method_is_not_implemented() {
        let channel = channel_on_loopback("test/missing");
        channel.handle_fn("echo", |args| Ok(args));
        channel.unregister("echo");
        // Unregistering twice stays a no-op.
        channel.unregister("echo");

        match channel.invoke_method("echo", Value::Null) {
            Err(MethodCallError::NotImplemented) => {}
            other => panic!("expected not implemented, got {:?}", other),
        }
    }

    #[test]
    fn test_silent_miss_at_dispatch_level() {
        let messenger = InProcessMessenger::loopback();
        let _channel = MethodChannel::new(messenger.clone(), "test/silent", &JSON_CODEC);

        let call = JSON_CODEC
            .encode_method_call(&MethodCall {
                method: "nobodyHome".into(),
                args: Value::Null,
            })
            .expect("encode failed");
        // Dispatch succeeds and answers with an empty reply, never an error.
        let reply = messenger.send("test/silent", &call).expect("send failed");
        assert!(reply.is_empty());
    }

    #[test]
    fn test_last_registration_wins() {
        let channel = channel_on_loopback("test/replace");
        channel.handle_fn("version", |_| Ok(Value::I64(1)));
        channel.handle_fn("version", |_| Ok(Value::I64(2)));

        let reply = channel
            .invoke_method("version", Value::Null)
            .expect("invocation failed");
        assert_eq!(reply, Value::I64(2));
    }

    #[test]
    fn test_method_names_are_case_sensitive() {
        let channel = channel_on_loopback("test/case");
        channel.handle_fn("getState", |_| Ok(Value::Boolean(true)));

        assert!(channel.invoke_method("getState", Value::Null).is_ok());
        match channel.invoke_method("getstate", Value::Null) {
            Err(MethodCallError::NotImplemented) => {}
            other => panic!("expected not implemented, got {:?}", other),
        }
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let channel = channel_on_loopback("test/panic");
        channel.handle_fn("explode", |_| panic!("handler bug"));
        channel.handle_fn("echo", |args| Ok(args));

        // The panic is caught at the dispatch boundary and degrades to an
        // empty reply; the channel keeps working for other methods.
        match channel.invoke_method("explode", Value::Null) {
            Err(MethodCallError::NotImplemented) => {}
            other => panic!("expected an empty reply, got {:?}", other),
        }
        let reply = channel
            .invoke_method("echo", json_value!([1, 2]))
            .expect("invocation failed");
        assert_eq!(reply, json_value!([1, 2]));
    }

    #[test]
    fn test_undecodable_message_fails_dispatch() {
        let messenger = InProcessMessenger::loopback();
        let _channel = MethodChannel::new(messenger.clone(), "test/garbage", &JSON_CODEC);

        match messenger.send("test/garbage", b"not a method call") {
            Err(MessengerError::DispatchFailed(_)) => {}
            other => panic!("expected a dispatch failure, got {:?}", other),
        }
    }

    #[test]
    fn test_struct_handler() {
        struct Counter(std::sync::atomic::AtomicI64);

        impl MethodHandler for Counter {
            fn handle_method(&self, _arguments: Value) -> HandlerResult {
                let n = self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(Value::I64(n + 1))
            }
        }

        let channel = channel_on_loopback("test/counter");
        channel.handle("next", Counter(std::sync::atomic::AtomicI64::new(0)));

        assert_eq!(
            channel.invoke_method("next", Value::Null).expect("invocation failed"),
            Value::I64(1)
        );
        assert_eq!(
            channel.invoke_method("next", Value::Null).expect("invocation failed"),
            Value::I64(2)
        );
    }

    #[test]
    fn test_paired_messengers_cross_invoke() {
        let (host_messenger, remote_messenger) = InProcessMessenger::pair();
        let host = MethodChannel::new(host_messenger, "app/nav", &STANDARD_CODEC);
        let remote = MethodChannel::new(remote_messenger, "app/nav", &STANDARD_CODEC);

        remote.handle_fn("pushRoute", |args| Ok(args));
        host.handle_fn("popRoute", |_| Ok(Value::Boolean(true)));

        let reply = host
            .invoke_method("pushRoute", json_value!("/details"))
            .expect("invocation failed");
        assert_eq!(reply, Value::String("/details".into()));

        let reply = remote
            .invoke_method("popRoute", Value::Null)
            .expect("invocation failed");
        assert_eq!(reply, Value::Boolean(true));
    }

    #[test]
    fn test_concurrent_dispatch_and_registration() {
        let channel = channel_on_loopback("test/contention");
        channel.handle_fn("echo", |args| Ok(args));

        let mut workers = Vec::new();
        for t in 0..8i64 {
            let channel = Arc::clone(&channel);
            workers.push(thread::spawn(move || {
                let name = format!("worker{}", t);
                for i in 0..50 {
                    let reply = channel
                        .invoke_method("echo", Value::I64(i))
                        .expect("invocation failed");
                    assert_eq!(reply, Value::I64(i));
                    // Churn the registry while other threads dispatch.
                    channel.handle_fn(&name, move |_| Ok(Value::I64(t)));
                    channel.unregister(&name);
                    channel.handle_fn(&name, move |_| Ok(Value::I64(t)));
                }
            }));
        }
        for worker in workers {
            worker.join().expect("worker panicked");
        }

        // The registry holds exactly the last registration per name.
        for t in 0..8i64 {
            let reply = channel
                .invoke_method(format!("worker{}", t), Value::Null)
                .expect("invocation failed");
            assert_eq!(reply, Value::I64(t));
        }
    }

    #[test]
    fn test_concurrent_panics_do_not_poison_other_dispatches() {
        let channel = channel_on_loopback("test/mixed");
        channel.handle_fn("explode", |_| panic!("handler bug"));
        channel.handle_fn("echo", |args| Ok(args));

        let mut workers = Vec::new();
        for t in 0..4 {
            let channel = Arc::clone(&channel);
            workers.push(thread::spawn(move || {
                for i in 0..25i64 {
                    if t % 2 == 0 {
                        let reply = channel
                            .invoke_method("echo", Value::I64(i))
                            .expect("invocation failed");
                        assert_eq!(reply, Value::I64(i));
                    } else {
                        assert!(matches!(
                            channel.invoke_method("explode", Value::Null),
                            Err(MethodCallError::NotImplemented)
                        ));
                    }
                }
            }));
        }
        for worker in workers {
            worker.join().expect("worker panicked");
        }
    }
}
