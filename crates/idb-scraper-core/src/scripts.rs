//! In-page scripts
//!
//! Each request body is an async function taking one JSON argument object.
//! Bodies never reject: every failure is returned as an error envelope with
//! its category. The prelude is shared by all three.

pub(crate) const PRELUDE: &str = r#"
const ok = (value) => ({ status: "ok", value });
const fail = (kind, message) => ({ status: "error", kind, message: String(message) });
const describe = (err) => {
  if (err && typeof err.message === "string" && err.message) {
    return err.name && err.name !== "Error" ? `${err.name}: ${err.message}` : err.message;
  }
  return String(err);
};
const failure = (err, fallbackKind) =>
  err && err.kind ? fail(err.kind, err.message) : fail(fallbackKind, describe(err));
const bounded = (promise, ms, kind, what) => {
  if (!(ms > 0)) return promise;
  let timer;
  const expiry = new Promise((_, reject) => {
    timer = setTimeout(() => reject({ kind, message: `${what} timed out after ${ms} ms` }), ms);
  });
  return Promise.race([promise, expiry]).finally(() => clearTimeout(timer));
};
const settle = (request, kind, what) => new Promise((resolve, reject) => {
  request.onsuccess = () => resolve(request.result);
  request.onerror = (event) => {
    if (event && event.preventDefault) event.preventDefault();
    reject({ kind, message: `${what}: ${describe(request.error)}` });
  };
});
const openDatabase = (name, ms) => new Promise((resolve, reject) => {
  let done = false;
  let timer = null;
  const finish = () => {
    done = true;
    if (timer !== null) clearTimeout(timer);
  };
  let request;
  try {
    request = indexedDB.open(name);
  } catch (err) {
    reject({ kind: "open", message: `Could not open database: ${describe(err)}` });
    return;
  }
  if (ms > 0) {
    timer = setTimeout(() => {
      done = true;
      reject({ kind: "open", message: `Opening database timed out after ${ms} ms` });
    }, ms);
  }
  request.onupgradeneeded = () => {
    request.transaction.abort();
  };
  request.onsuccess = () => {
    const db = request.result;
    if (done) {
      db.close();
      return;
    }
    finish();
    resolve(db);
  };
  request.onerror = (event) => {
    if (event && event.preventDefault) event.preventDefault();
    if (done) return;
    finish();
    reject({ kind: "open", message: `Could not open database: ${describe(request.error)}` });
  };
});
const encode = (value, seen) => {
  if (value === null || value === undefined) return null;
  switch (typeof value) {
    case "string":
    case "boolean":
      return value;
    case "number":
      return Number.isFinite(value) ? value : String(value);
    case "bigint":
      return value.toString();
    case "object":
      break;
    default:
      return String(value);
  }
  if (seen.has(value)) return "[Circular]";
  seen.add(value);
  try {
    if (value instanceof Date) {
      return Number.isNaN(value.getTime()) ? String(value) : value.toISOString();
    }
    if (Array.isArray(value)) return value.map((item) => encode(item, seen));
    if (value instanceof Map) {
      return Array.from(value.entries(), ([k, v]) => [encode(k, seen), encode(v, seen)]);
    }
    if (value instanceof Set) return Array.from(value, (item) => encode(item, seen));
    if (value instanceof ArrayBuffer) return Array.from(new Uint8Array(value));
    if (value instanceof DataView) {
      return Array.from(new Uint8Array(value.buffer, value.byteOffset, value.byteLength));
    }
    if (ArrayBuffer.isView(value)) return Array.from(value, (item) => encode(item, seen));
    const proto = Object.getPrototypeOf(value);
    if (proto !== Object.prototype && proto !== null) return String(value);
    // defineProperty keeps an own "__proto__" key as data
    const out = {};
    for (const [k, v] of Object.entries(value)) {
      Object.defineProperty(out, k, {
        value: encode(v, seen),
        enumerable: true,
        writable: true,
        configurable: true,
      });
    }
    return out;
  } catch (err) {
    return String(value);
  } finally {
    seen.delete(value);
  }
};
const encodeAll = (items) => Array.from(items, (item) => encode(item, new Set()));
"#;

pub(crate) const LIST_DATABASES: &str = r#"
async ({ timeoutMs }) => {
  if (typeof indexedDB === "undefined" || typeof indexedDB.databases !== "function") {
    return fail("unavailable", "indexedDB.databases() not supported");
  }
  try {
    const dbs = await bounded(indexedDB.databases(), timeoutMs, "unavailable", "Listing databases");
    return ok(dbs.map((db) => db.name).filter((name) => typeof name === "string"));
  } catch (err) {
    return failure(err, "unavailable");
  }
}
"#;

pub(crate) const LIST_OBJECT_STORES: &str = r#"
async ({ database, timeoutMs }) => {
  let db;
  try {
    db = await openDatabase(database, timeoutMs);
  } catch (err) {
    return failure(err, "open");
  }
  try {
    return ok(Array.from(db.objectStoreNames));
  } catch (err) {
    return fail("schema_read", describe(err));
  } finally {
    db.close();
  }
}
"#;

pub(crate) const EXTRACT_STORE: &str = r#"
async ({ database, store, timeoutMs }) => {
  let db;
  try {
    db = await openDatabase(database, timeoutMs);
  } catch (err) {
    return failure(err, "open");
  }
  try {
    let objectStore;
    try {
      objectStore = db.transaction(store, "readonly").objectStore(store);
    } catch (err) {
      return fail("transaction", `Error accessing object store ${store}: ${describe(err)}`);
    }
    const keys = settle(objectStore.getAllKeys(), "scan", "Could not get keys");
    const values = settle(objectStore.getAll(), "scan", "Could not get values");
    const [rawKeys, rawValues] = await bounded(
      Promise.all([keys, values]),
      timeoutMs,
      "scan",
      `Reading object store ${store}`,
    );
    return ok({ keys: encodeAll(rawKeys), values: encodeAll(rawValues) });
  } catch (err) {
    return failure(err, "scan");
  } finally {
    db.close();
  }
}
"#;
