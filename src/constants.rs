pub const ALL_VERBS: [&str; 12] = [
    GET,
    LIST,
    WATCH,
    CREATE,
    UPDATE,
    PATCH,
    DELETE,
    DELETECOLLECTION,
    USE,
    BIND,
    ESCALATE,
    IMPERSONATE,
];

/// Probes allowed in flight at once unless configured otherwise.
pub const DEFAULT_CONCURRENCY: usize = 20;

/// Identity label shown when the cluster cannot tell us who we are.
pub const FALLBACK_IDENTITY: &str = "current";

/// Namespace scanned when none is requested and none is configured.
pub const FALLBACK_NAMESPACE: &str = "default";

const GET: &str = "get";
const LIST: &str = "list";
const WATCH: &str = "watch";
const CREATE: &str = "create";
const UPDATE: &str = "update";
const PATCH: &str = "patch";
const DELETE: &str = "delete";
const DELETECOLLECTION: &str = "deletecollection";
const USE: &str = "use";
const BIND: &str = "bind";
const ESCALATE: &str = "escalate";
const IMPERSONATE: &str = "impersonate";
