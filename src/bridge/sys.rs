// Raw FFI bindings to the libcollections entry points used by the bridge.
use libc::{
    c_char, c_double, c_float, c_int, c_long, c_longlong, c_short, c_uchar, c_uint, c_ulong,
    c_ulonglong, c_ushort, c_void,
};

unsafe extern "C" {
    pub fn cl_get_last_error() -> c_int;

    pub fn cl_string_valueof(string: *const c_void) -> *const c_char;
    pub fn cl_string_set_content(string: *mut c_void, content: *const c_char) -> c_int;
    pub fn cl_string_unref(string: *mut c_void) -> c_int;

    pub fn cl_object_to_cstring(object: *const c_void) -> *mut c_void;
    pub fn cl_object_set_ex(object: *mut c_void, content: *const c_char) -> c_int;
    pub fn cl_object_unref(object: *mut c_void) -> c_int;

    pub fn cl_cfg_get_value(
        file: *const c_void,
        block: *const c_char,
        entry: *const c_char,
    ) -> *mut c_void;

    pub fn cl_cfg_set_value_ex(
        file: *mut c_void,
        block: *const c_char,
        entry: *const c_char,
        content: *const c_char,
    ) -> c_int;

    pub fn cl_hashtable_contains_key(hashtable: *mut c_void, key: *const c_char) -> bool;

    pub fn cl_plugin_argument_char(args: *mut c_void, name: *const c_char) -> c_char;
    pub fn cl_plugin_argument_uchar(args: *mut c_void, name: *const c_char) -> c_uchar;
    pub fn cl_plugin_argument_int(args: *mut c_void, name: *const c_char) -> c_int;
    pub fn cl_plugin_argument_uint(args: *mut c_void, name: *const c_char) -> c_uint;
    pub fn cl_plugin_argument_sint(args: *mut c_void, name: *const c_char) -> c_short;
    pub fn cl_plugin_argument_usint(args: *mut c_void, name: *const c_char) -> c_ushort;
    pub fn cl_plugin_argument_long(args: *mut c_void, name: *const c_char) -> c_long;
    pub fn cl_plugin_argument_ulong(args: *mut c_void, name: *const c_char) -> c_ulong;
    pub fn cl_plugin_argument_llong(args: *mut c_void, name: *const c_char) -> c_longlong;
    pub fn cl_plugin_argument_ullong(args: *mut c_void, name: *const c_char) -> c_ulonglong;
    pub fn cl_plugin_argument_float(args: *mut c_void, name: *const c_char) -> c_float;
    pub fn cl_plugin_argument_double(args: *mut c_void, name: *const c_char) -> c_double;
    pub fn cl_plugin_argument_bool(args: *mut c_void, name: *const c_char) -> bool;
    pub fn cl_plugin_argument_string(args: *mut c_void, name: *const c_char) -> *mut c_char;
    pub fn cl_plugin_argument_pointer(
        args: *mut c_void,
        name: *const c_char,
        ptr: *mut *mut c_void,
    ) -> c_int;
}
