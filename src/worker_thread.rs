use std::{
    any::Any,
    io,
    thread::{self, JoinHandle, ThreadId},
};

/// Named OS thread that is joined when dropped.
#[derive(Debug)]
pub struct WorkerThread {
    name: String,
    id: ThreadId,
    handle: Option<JoinHandle<()>>,
}

impl WorkerThread {
    pub fn spawn<F>(name: impl Into<String>, f: F) -> io::Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();
        let handle = thread::Builder::new().name(name.clone()).spawn(f)?;

        Ok(Self {
            name,
            id: handle.thread().id(),
            handle: Some(handle),
        })
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_current(&self) -> bool {
        thread::current().id() == self.id
    }

    pub fn join(mut self) {
        self.join_inner();
    }

    fn join_inner(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        // Joining ourselves would never return.
        if self.is_current() {
            tracing::warn!(thread = %self.name, "worker asked to join itself, detaching");
            return;
        }

        if handle.join().is_err() {
            tracing::error!(thread = %self.name, "worker thread panicked");
        }
    }
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        self.join_inner();
    }
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
