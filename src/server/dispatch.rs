//! Packet handling: parse each datagram and hand messages to callbacks.

use std::sync::{Arc, PoisonError, RwLock};

use crate::blob::BlobHandle;
use crate::codec::{MessageValues, Parser, read_bundle_header};

/// Handles one received datagram sitting in `parser`'s buffer.
///
/// Called on the socket's receive task; the next receive waits until it
/// returns.
pub trait PacketHandler: Send + Sync + 'static {
    fn parse_buffer(&self, parser: &mut Parser, byte_count: usize);
}

/// Callback invoked with the address and values of every received message.
///
/// Both arguments borrow the receive buffer and are only valid for the
/// duration of the call. Copy out anything that must outlive it, e.g. with
/// [`BlobHandle::to_blob_string`].
pub type MonitorCallback = Arc<dyn Fn(BlobHandle<'_>, &MessageValues<'_>) + Send + Sync>;

/// Parses datagrams and fans each message out to monitor callbacks.
#[derive(Default)]
pub struct Dispatcher {
    callbacks: RwLock<Arc<[MonitorCallback]>>,
}

impl Dispatcher {
    /// A dispatcher with no callbacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback. The same callback may be registered more than
    /// once and is then invoked once per registration.
    pub fn add_callback(&self, callback: MonitorCallback) {
        let mut callbacks = self.callbacks.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = callbacks.to_vec();
        next.push(callback);
        *callbacks = next.into();
    }

    /// Removes one registration of `callback`, compared by identity.
    /// Returns whether anything was removed.
    pub fn remove_callback(&self, callback: &MonitorCallback) -> bool {
        let mut callbacks = self.callbacks.write().unwrap_or_else(PoisonError::into_inner);
        let target = Arc::as_ptr(callback) as *const ();
        let Some(pos) = callbacks
            .iter()
            .position(|cb| Arc::as_ptr(cb) as *const () == target)
        else {
            return false;
        };
        let mut next = callbacks.to_vec();
        next.remove(pos);
        *callbacks = next.into();
        true
    }

    /// Number of current registrations.
    pub fn callback_count(&self) -> usize {
        self.snapshot().len()
    }

    fn snapshot(&self) -> Arc<[MonitorCallback]> {
        self.callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn dispatch(&self, callbacks: &[MonitorCallback], parser: &Parser) {
        let address = parser.address();
        let values = parser.values();
        for callback in callbacks {
            callback(address, &values);
        }
    }

    fn parse_bundle(&self, callbacks: &[MonitorCallback], parser: &mut Parser, byte_count: usize) {
        let (time, mut cursor) = match read_bundle_header(parser.buffer(), 0, byte_count) {
            Ok(header) => header,
            Err(e) => {
                tracing::debug!(byte_count, error = %e, "dropping malformed bundle");
                return;
            }
        };
        tracing::trace!(%time, byte_count, "received bundle");

        loop {
            let range = match cursor.next(parser.buffer()) {
                None => break,
                Some(Ok(range)) => range,
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "dropping rest of malformed bundle");
                    break;
                }
            };
            if parser.is_bundle_tag_at(range.start) {
                tracing::debug!(offset = range.start, "skipping nested bundle");
                continue;
            }
            match parser.parse_at(range.start, range.end) {
                Ok(_) => self.dispatch(callbacks, parser),
                Err(e) => {
                    tracing::debug!(offset = range.start, error = %e, "dropping malformed bundle element");
                }
            }
        }
    }
}

impl PacketHandler for Dispatcher {
    fn parse_buffer(&self, parser: &mut Parser, byte_count: usize) {
        let callbacks = self.snapshot();

        if parser.is_bundle_tag_at(0) {
            self.parse_bundle(&callbacks, parser, byte_count);
            return;
        }

        match parser.parse(byte_count) {
            Ok(_) => self.dispatch(&callbacks, parser),
            Err(e) => {
                tracing::debug!(byte_count, error = %e, "dropping malformed packet");
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("callbacks", &self.callback_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::OscWriter;
    use crate::codec::tag::single;
    use crate::types::NtpTimestamp;
    use std::sync::Mutex;

    fn load(parser: &mut Parser, bytes: &[u8]) -> usize {
        parser.buffer_mut()[..bytes.len()].copy_from_slice(bytes);
        bytes.len()
    }

    fn recorder() -> (MonitorCallback, Arc<Mutex<Vec<(String, f32)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: MonitorCallback = Arc::new(move |address: BlobHandle<'_>, values: &MessageValues<'_>| {
            let address = address.to_blob_string().to_string();
            let value = values.read_float(0).unwrap_or(f32::NAN);
            sink.lock().unwrap().push((address, value));
        });
        (callback, seen)
    }

    fn tempo_packet() -> OscWriter {
        let mut w = OscWriter::new();
        w.write_address_and_tags("/composition/tempo", single::FLOAT32);
        w.write_f32(144.0);
        w
    }

    #[test]
    fn dispatches_message_to_every_callback() {
        let dispatcher = Dispatcher::new();
        let (a, seen_a) = recorder();
        let (b, seen_b) = recorder();
        dispatcher.add_callback(a);
        dispatcher.add_callback(b);

        let mut parser = Parser::new();
        let len = load(&mut parser, tempo_packet().as_bytes());
        dispatcher.parse_buffer(&mut parser, len);

        let expected = vec![("/composition/tempo".to_string(), 144.0)];
        assert_eq!(*seen_a.lock().unwrap(), expected);
        assert_eq!(*seen_b.lock().unwrap(), expected);
    }

    #[test]
    fn duplicate_registration_and_removal() {
        let dispatcher = Dispatcher::new();
        let (cb, seen) = recorder();
        dispatcher.add_callback(cb.clone());
        dispatcher.add_callback(cb.clone());
        assert_eq!(dispatcher.callback_count(), 2);

        let mut parser = Parser::new();
        let len = load(&mut parser, tempo_packet().as_bytes());
        dispatcher.parse_buffer(&mut parser, len);
        assert_eq!(seen.lock().unwrap().len(), 2);

        assert!(dispatcher.remove_callback(&cb));
        assert_eq!(dispatcher.callback_count(), 1);
        assert!(dispatcher.remove_callback(&cb));
        assert!(!dispatcher.remove_callback(&cb));
        assert_eq!(dispatcher.callback_count(), 0);

        dispatcher.parse_buffer(&mut parser, len);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn removal_is_by_identity() {
        let dispatcher = Dispatcher::new();
        let (a, _) = recorder();
        let (b, _) = recorder();
        dispatcher.add_callback(a);
        assert!(!dispatcher.remove_callback(&b));
        assert_eq!(dispatcher.callback_count(), 1);
    }

    #[test]
    fn malformed_packet_is_dropped() {
        let dispatcher = Dispatcher::new();
        let (cb, seen) = recorder();
        dispatcher.add_callback(cb);

        let mut parser = Parser::new();
        let len = load(&mut parser, b"garbage!");
        dispatcher.parse_buffer(&mut parser, len);
        assert!(seen.lock().unwrap().is_empty());

        // the next good packet still goes through
        let len = load(&mut parser, tempo_packet().as_bytes());
        dispatcher.parse_buffer(&mut parser, len);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn dispatches_each_bundle_element() {
        let dispatcher = Dispatcher::new();
        let (cb, seen) = recorder();
        dispatcher.add_callback(cb);

        let mut w = OscWriter::new();
        w.write_bundle_header(NtpTimestamp::IMMEDIATELY);
        for (address, value) in [("/a", 1.0f32), ("/b", 2.0)] {
            let mark = w.begin_bundle_element();
            w.write_str(address);
            w.write_tags(&[crate::codec::TypeTag::Float32]);
            w.write_f32(value);
            w.end_bundle_element(mark);
        }
        // a nested bundle is skipped
        let mark = w.begin_bundle_element();
        w.write_str("#bundle");
        w.write_timestamp(NtpTimestamp::IMMEDIATELY);
        w.end_bundle_element(mark);

        let mut parser = Parser::new();
        let len = load(&mut parser, w.as_bytes());
        dispatcher.parse_buffer(&mut parser, len);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![("/a".to_string(), 1.0), ("/b".to_string(), 2.0)]
        );
    }

    #[test]
    fn callbacks_added_during_dispatch_apply_to_next_packet() {
        let dispatcher = Arc::new(Dispatcher::new());
        let (late, seen) = recorder();
        let weak = Arc::downgrade(&dispatcher);
        let added = Arc::new(Mutex::new(false));
        let flag = added.clone();
        dispatcher.add_callback(Arc::new(move |_: BlobHandle<'_>, _: &MessageValues<'_>| {
            let mut flag = flag.lock().unwrap();
            if !*flag {
                if let Some(d) = weak.upgrade() {
                    d.add_callback(late.clone());
                }
                *flag = true;
            }
        }));

        let mut parser = Parser::new();
        let len = load(&mut parser, tempo_packet().as_bytes());
        dispatcher.parse_buffer(&mut parser, len);
        assert!(seen.lock().unwrap().is_empty());

        dispatcher.parse_buffer(&mut parser, len);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
