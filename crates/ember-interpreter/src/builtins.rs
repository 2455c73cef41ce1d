//! Intrinsic functions, dispatched by name before user-scope lookup.

use std::io::{BufRead, Write};

use rand::Rng;
use regex::Regex;

use crate::meta;
use crate::value::{Value, TYPE_ARRAY, TYPE_INTEGER, TYPE_STRING};

pub type BuiltinFn = fn(&[Value]) -> Result<Value, String>;

/// Look a name up in the builtin table.
pub fn lookup(name: &str) -> Option<BuiltinFn> {
    let builtin: BuiltinFn = match name {
        "echo" | "puts" | "println" | "writeln" => print_line,
        "put" | "print" | "write" => print_raw,
        "prompt" => prompt,
        "quit" => quit,
        "panic" => panic_builtin,
        "typeof" => type_of,
        "len" => len,
        "first" => first,
        "last" => last,
        "rest" => rest,
        "push" => push,
        "String" => cast_string,
        "Int" => cast_int,
        "Float" => cast_float,
        "Array" => cast_array,
        "runtime_rand" => runtime_rand,
        "runtime_tolower" => runtime_tolower,
        "runtime_toupper" => runtime_toupper,
        "runtime_regex_match" => runtime_regex_match,
        "Environment" => |_| Ok(Value::Str(meta::environment())),
        "NameVersionEnvironment" => |_| Ok(Value::Str(meta::name_version_environment())),
        "Name" => |_| Ok(Value::Str(meta::NAME.to_string())),
        "Version" => |_| Ok(Value::Str(meta::VERSION.to_string())),
        "NameVersion" => |_| Ok(Value::Str(meta::name_version())),
        "AuthorName" => |_| Ok(Value::Str(meta::AUTHOR_NAME.to_string())),
        "AuthorEmail" => |_| Ok(Value::Str(meta::AUTHOR_EMAIL.to_string())),
        "Copyright" => |_| Ok(Value::Str(meta::copyright())),
        _ => return None,
    };
    Some(builtin)
}

fn print_line(args: &[Value]) -> Result<Value, String> {
    for arg in args {
        println!("{}", arg.check());
    }
    Ok(Value::Str(String::new()))
}

fn print_raw(args: &[Value]) -> Result<Value, String> {
    for arg in args {
        print!("{}", arg.check());
    }
    let _ = std::io::stdout().flush();
    Ok(Value::Str(String::new()))
}

fn prompt(args: &[Value]) -> Result<Value, String> {
    if let Some(message) = args.first() {
        print!("{}", message.check());
        let _ = std::io::stdout().flush();
    }
    let mut out = String::new();
    let _ = std::io::stdin().lock().read_line(&mut out);
    Ok(Value::Str(out.trim_end_matches(&['\r', '\n'][..]).to_string()))
}

fn quit(_args: &[Value]) -> Result<Value, String> {
    std::process::exit(0);
}

fn panic_builtin(args: &[Value]) -> Result<Value, String> {
    let message = args.first().map(Value::check).unwrap_or_default();
    Err(message)
}

fn type_of(args: &[Value]) -> Result<Value, String> {
    if args.len() != 1 {
        return Err("typeof() expects exactly 1 argument".into());
    }
    Ok(Value::Str(args[0].type_name().to_string()))
}

fn len(args: &[Value]) -> Result<Value, String> {
    if args.len() != 1 {
        return Err("len() expects exactly 1 argument".into());
    }
    match &args[0] {
        Value::Array(elements) => Ok(Value::Integer(elements.borrow().len() as i64)),
        Value::Str(value) => Ok(Value::Integer(value.len() as i64)),
        other => Err(format!(
            "Argument to `len` not supported, got {}",
            other.type_name()
        )),
    }
}

fn first(args: &[Value]) -> Result<Value, String> {
    let elements = single_array(args, "first")?;
    let elements = elements.borrow();
    Ok(elements.first().cloned().unwrap_or(Value::Nil))
}

fn last(args: &[Value]) -> Result<Value, String> {
    let elements = single_array(args, "last")?;
    let elements = elements.borrow();
    Ok(elements.last().cloned().unwrap_or(Value::Nil))
}

fn rest(args: &[Value]) -> Result<Value, String> {
    let elements = single_array(args, "rest")?;
    let elements = elements.borrow();
    if elements.is_empty() {
        return Ok(Value::Nil);
    }
    Ok(Value::array(elements[1..].to_vec()))
}

fn push(args: &[Value]) -> Result<Value, String> {
    if args.len() != 2 {
        return Err("push() expects exactly 2 arguments".into());
    }
    match &args[0] {
        Value::Array(elements) => {
            let mut out = elements.borrow().clone();
            out.push(args[1].clone());
            Ok(Value::array(out))
        }
        other => Err(format!(
            "Argument to `push` must be {}, got {}",
            TYPE_ARRAY,
            other.type_name()
        )),
    }
}

fn single_array<'a>(
    args: &'a [Value],
    name: &str,
) -> Result<&'a std::rc::Rc<std::cell::RefCell<Vec<Value>>>, String> {
    if args.len() != 1 {
        return Err(format!("{}() expects exactly 1 argument", name));
    }
    match &args[0] {
        Value::Array(elements) => Ok(elements),
        other => Err(format!(
            "Argument to `{}` must be {}, got {}",
            name,
            TYPE_ARRAY,
            other.type_name()
        )),
    }
}

fn cast_string(args: &[Value]) -> Result<Value, String> {
    if args.len() != 1 {
        return Err("String() expects exactly 1 argument".into());
    }
    match &args[0] {
        Value::Integer(_) | Value::Float(_) | Value::Boolean(_) => {
            Ok(Value::Str(args[0].check()))
        }
        Value::Str(value) => Ok(Value::Str(value.clone())),
        other => Err(format!(
            "String() can't convert '{}' to {}",
            other.type_name(),
            TYPE_STRING
        )),
    }
}

fn cast_int(args: &[Value]) -> Result<Value, String> {
    if args.len() != 1 {
        return Err("Int() expects exactly 1 argument".into());
    }
    match &args[0] {
        Value::Str(value) => value
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| format!("Int() can't convert '{}' to {}", value, TYPE_INTEGER)),
        Value::Float(value) => Ok(Value::Integer(*value as i64)),
        Value::Boolean(value) => Ok(Value::Integer(i64::from(*value))),
        Value::Integer(value) => Ok(Value::Integer(*value)),
        other => Err(format!(
            "Int() can't convert '{}' to {}",
            other.type_name(),
            TYPE_INTEGER
        )),
    }
}

fn cast_float(args: &[Value]) -> Result<Value, String> {
    if args.len() != 1 {
        return Err("Float() expects exactly 1 argument".into());
    }
    match &args[0] {
        Value::Str(value) => value
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| format!("Float() can't convert '{}' to Float", value)),
        Value::Integer(value) => Ok(Value::Float(*value as f64)),
        Value::Boolean(value) => Ok(Value::Float(f64::from(u8::from(*value)))),
        Value::Float(value) => Ok(Value::Float(*value)),
        other => Err(format!(
            "Float() can't convert '{}' to Float",
            other.type_name()
        )),
    }
}

fn cast_array(args: &[Value]) -> Result<Value, String> {
    if args.len() != 1 {
        return Err("Array() expects exactly 1 argument".into());
    }
    match &args[0] {
        Value::Array(_) => Ok(args[0].clone()),
        other => Ok(Value::array(vec![other.clone()])),
    }
}

/// Uniform integer in `[min, max)`.
fn runtime_rand(args: &[Value]) -> Result<Value, String> {
    if args.len() != 2 {
        return Err("runtime_rand() expects exactly 2 arguments".into());
    }
    let (min, max) = match (&args[0], &args[1]) {
        (Value::Integer(min), Value::Integer(max)) => (*min, *max),
        _ => return Err("runtime_rand() expects min and max as Integers".into()),
    };
    if max < min {
        return Err("runtime_rand() expects max higher than min".into());
    }
    if max == min {
        return Ok(Value::Integer(min));
    }
    let value = rand::thread_rng().gen_range(min..max);
    Ok(Value::Integer(value))
}

fn runtime_tolower(args: &[Value]) -> Result<Value, String> {
    match args {
        [Value::Str(value)] => Ok(Value::Str(value.to_lowercase())),
        _ => Err("runtime_tolower() expects a String".into()),
    }
}

fn runtime_toupper(args: &[Value]) -> Result<Value, String> {
    match args {
        [Value::Str(value)] => Ok(Value::Str(value.to_uppercase())),
        _ => Err("runtime_toupper() expects a String".into()),
    }
}

/// True when the pattern matches anywhere in the subject. The dialect is the
/// `regex` crate's: RE2-style, no backreferences or lookaround.
fn runtime_regex_match(args: &[Value]) -> Result<Value, String> {
    let (subject, pattern) = match args {
        [Value::Str(subject), Value::Str(pattern)] => (subject, pattern),
        [_, _] => return Err("runtime_regex_match() expects two Strings".into()),
        _ => return Err("runtime_regex_match() expects exactly 2 arguments".into()),
    };
    let regex = Regex::new(pattern)
        .map_err(|_| "runtime_regex_match() couldn't compile the regular expression".to_string())?;
    Ok(Value::Boolean(regex.is_match(subject)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_lookup() {
        assert!(lookup("echo").is_some());
        assert!(lookup("runtime_regex_match").is_some());
        assert!(lookup("Copyright").is_some());
        assert!(lookup("no_such_builtin").is_none());
    }

    #[test]
    fn typeof_and_len() {
        let out = type_of(&[Value::Integer(1)]).unwrap();
        assert_eq!(out.check(), "Integer");

        let out = len(&[Value::Str("four".into())]).unwrap();
        assert_eq!(out.check(), "4");

        let out = len(&[Value::array(vec![Value::Nil, Value::Nil])]).unwrap();
        assert_eq!(out.check(), "2");

        assert!(len(&[Value::Integer(1)]).is_err());
        assert!(len(&[]).is_err());
    }

    #[test]
    fn array_accessors() {
        let arr = Value::array(vec![
            Value::Integer(1),
            Value::Integer(2),
            Value::Integer(3),
        ]);
        assert_eq!(first(&[arr.clone()]).unwrap().check(), "1");
        assert_eq!(last(&[arr.clone()]).unwrap().check(), "3");
        assert_eq!(rest(&[arr.clone()]).unwrap().check(), "[2, 3]");

        let out = push(&[arr.clone(), Value::Integer(4)]).unwrap();
        assert_eq!(out.check(), "[1, 2, 3, 4]");
        // push returns a fresh array
        assert_eq!(arr.check(), "[1, 2, 3]");

        let empty = Value::array(vec![]);
        assert_eq!(first(&[empty]).unwrap().check(), "nil");
    }

    #[test]
    fn casts() {
        assert_eq!(cast_int(&[Value::Str("42".into())]).unwrap().check(), "42");
        assert_eq!(cast_int(&[Value::Float(9.7)]).unwrap().check(), "9");
        assert_eq!(cast_int(&[Value::Boolean(true)]).unwrap().check(), "1");
        assert!(cast_int(&[Value::Str("nope".into())]).is_err());

        assert_eq!(
            cast_float(&[Value::Integer(2)]).unwrap().check(),
            "2.000000"
        );
        assert_eq!(
            cast_string(&[Value::Integer(7)]).unwrap().check(),
            "7"
        );
        assert!(cast_string(&[Value::Nil]).is_err());

        assert_eq!(
            cast_array(&[Value::Integer(1)]).unwrap().check(),
            "[1]"
        );
    }

    #[test]
    fn rand_stays_in_range() {
        for _ in 0..50 {
            let out = runtime_rand(&[Value::Integer(3), Value::Integer(6)]).unwrap();
            match out {
                Value::Integer(n) => assert!((3..6).contains(&n)),
                other => panic!("expected an integer, got {:?}", other),
            }
        }
        assert!(runtime_rand(&[Value::Integer(5), Value::Integer(1)]).is_err());
    }

    #[test]
    fn case_conversion() {
        assert_eq!(
            runtime_tolower(&[Value::Str("AbC".into())]).unwrap().check(),
            "abc"
        );
        assert_eq!(
            runtime_toupper(&[Value::Str("AbC".into())]).unwrap().check(),
            "ABC"
        );
    }

    #[test]
    fn regex_match() {
        let out =
            runtime_regex_match(&[Value::Str("hello world".into()), Value::Str("wor.d".into())])
                .unwrap();
        assert_eq!(out.check(), "true");

        let out = runtime_regex_match(&[Value::Str("hello".into()), Value::Str("^z".into())])
            .unwrap();
        assert_eq!(out.check(), "false");

        assert!(runtime_regex_match(&[
            Value::Str("x".into()),
            Value::Str("(unclosed".into())
        ])
        .is_err());
    }
}
