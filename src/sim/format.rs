//! Форматирование вывода `printf` и `print`.
//!
//! Поддерживаются `%d %i %u %x %X %c %s %f %e %g %%` с флагами `-`, `0`,
//! `+`, пробел, шириной и точностью (`%8.3f`, `%-5d`).

use crate::ir::Const;

use super::error::ExecError;

#[derive(Debug, Default)]
struct Spec {
    left: bool,
    zero: bool,
    plus: bool,
    space: bool,
    width: usize,
    precision: Option<usize>,
}

fn as_int(value: &Const) -> i64 {
    match value {
        Const::Int(n) => *n,
        Const::Float(x) => *x as i64,
        Const::Str(_) => 0,
    }
}

fn as_float(value: &Const) -> f64 {
    match value {
        Const::Int(n) => *n as f64,
        Const::Float(x) => *x,
        Const::Str(_) => 0.0,
    }
}

fn non_finite(x: f64) -> Option<String> {
    if x.is_nan() {
        Some("nan".to_string())
    } else if x.is_infinite() {
        Some(if x > 0.0 { "inf" } else { "-inf" }.to_string())
    } else {
        None
    }
}

/// `%e` в стиле C: мантисса и экспонента со знаком, не короче двух цифр.
fn format_exp(x: f64, precision: usize) -> String {
    if let Some(s) = non_finite(x) {
        return s;
    }
    let text = format!("{:.*e}", precision, x);
    let (mantissa, exponent) = text.split_once('e').unwrap_or((text.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{}e{}{:02}", mantissa, sign, exponent.abs())
}

fn strip_zeros(s: String) -> String {
    if !s.contains('.') {
        return s;
    }
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// `%g`: короче из `%e` и `%f`, без хвостовых нулей.
fn format_general(x: f64, precision: usize) -> String {
    if let Some(s) = non_finite(x) {
        return s;
    }
    let p = precision.max(1);
    if x == 0.0 {
        return "0".to_string();
    }
    let exponent = x.abs().log10().floor() as i32;
    if exponent < -4 || exponent >= p as i32 {
        let text = format_exp(x, p - 1);
        match text.split_once('e') {
            Some((mantissa, exp)) => format!("{}e{}", strip_zeros(mantissa.to_string()), exp),
            None => text,
        }
    } else {
        let decimals = (p as i32 - 1 - exponent).max(0) as usize;
        strip_zeros(format!("{:.*}", decimals, x))
    }
}

fn format_fixed(x: f64, precision: usize) -> String {
    non_finite(x).unwrap_or_else(|| format!("{:.*}", precision, x))
}

fn pad(body: String, spec: &Spec, numeric: bool) -> String {
    let mut body = body;
    if numeric && !body.starts_with('-') {
        if spec.plus {
            body.insert(0, '+');
        } else if spec.space {
            body.insert(0, ' ');
        }
    }
    let len = body.chars().count();
    if len >= spec.width {
        return body;
    }
    let fill = spec.width - len;
    if spec.left {
        body + &" ".repeat(fill)
    } else if spec.zero && numeric {
        let sign_len = usize::from(body.starts_with(['-', '+', ' ']));
        let (sign, digits) = body.split_at(sign_len);
        format!("{}{}{}", sign, "0".repeat(fill), digits)
    } else {
        " ".repeat(fill) + &body
    }
}

/// Отформатировать вызов `printf`. Возвращает текст вывода.
pub fn printf(format: &str, args: &[Const]) -> Result<String, ExecError> {
    let mut out = String::new();
    let mut args = args.iter();
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut spec = Spec::default();
        let mut raw = String::from("%");
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => spec.left = true,
                '0' => spec.zero = true,
                '+' => spec.plus = true,
                ' ' => spec.space = true,
                _ => break,
            }
            raw.push(flag);
            chars.next();
        }
        while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
            spec.width = spec.width * 10 + d as usize;
            raw.push(chars.next().unwrap_or('0'));
        }
        if chars.peek() == Some(&'.') {
            raw.push('.');
            chars.next();
            let mut precision = 0;
            while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
                precision = precision * 10 + d as usize;
                raw.push(chars.next().unwrap_or('0'));
            }
            spec.precision = Some(precision);
        }
        // Модификаторы длины ни на что не влияют
        while matches!(chars.peek(), Some('l' | 'h')) {
            chars.next();
        }

        let Some(conv) = chars.next() else {
            out.push_str(&raw);
            break;
        };
        if conv == '%' {
            out.push('%');
            continue;
        }
        if !"diuxXcsfFeEgG".contains(conv) {
            out.push_str(&raw);
            out.push(conv);
            continue;
        }

        let arg = args.next().ok_or_else(|| ExecError::Format {
            message: format!("missing argument for '{}{}'", raw, conv),
        })?;
        let precision = spec.precision.unwrap_or(6);

        let text = match conv {
            'd' | 'i' => pad(as_int(arg).to_string(), &spec, true),
            'u' => pad((as_int(arg) as u32).to_string(), &spec, true),
            'x' => pad(format!("{:x}", as_int(arg) as u32), &spec, true),
            'X' => pad(format!("{:X}", as_int(arg) as u32), &spec, true),
            'c' => {
                let ch = u32::try_from(as_int(arg))
                    .ok()
                    .and_then(char::from_u32)
                    .unwrap_or('?');
                pad(ch.to_string(), &spec, false)
            }
            's' => {
                let text = match arg {
                    Const::Str(s) => s.clone(),
                    other => other.to_string(),
                };
                let text = match spec.precision {
                    Some(limit) => text.chars().take(limit).collect(),
                    None => text,
                };
                pad(text, &spec, false)
            }
            'f' | 'F' => pad(format_fixed(as_float(arg), precision), &spec, true),
            'e' => pad(format_exp(as_float(arg), precision), &spec, true),
            'E' => pad(format_exp(as_float(arg), precision).to_uppercase(), &spec, true),
            'g' => pad(format_general(as_float(arg), precision), &spec, true),
            _ => pad(format_general(as_float(arg), precision).to_uppercase(), &spec, true),
        };
        out.push_str(&text);
    }

    Ok(out)
}

/// Вывод встроенной `print`: значение и перевод строки.
pub fn print(value: &Const) -> String {
    match value {
        Const::Int(n) => format!("{}\n", n),
        Const::Float(x) => format!("{}\n", format_fixed(*x, 6)),
        Const::Str(s) => format!("{}\n", s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(format: &str, args: &[Const]) -> String {
        printf(format, args).unwrap()
    }

    #[test]
    fn test_integers() {
        assert_eq!(fmt("Factorial of %d is %d\n", &[Const::Int(5), Const::Int(120)]), "Factorial of 5 is 120\n");
        assert_eq!(fmt("%5d|%-5d|%05d", &[Const::Int(42), Const::Int(42), Const::Int(-42)]), "   42|42   |-0042");
        assert_eq!(fmt("%x %X %u", &[Const::Int(255), Const::Int(255), Const::Int(-1)]), "ff FF 4294967295");
        assert_eq!(fmt("%+d %c%%", &[Const::Int(7), Const::Int(65)]), "+7 A%");
    }

    #[test]
    fn test_floats() {
        assert_eq!(fmt("%f", &[Const::Float(2.5)]), "2.500000");
        assert_eq!(fmt("%.2f", &[Const::Float(3.14159)]), "3.14");
        assert_eq!(fmt("%8.3f", &[Const::Float(-1.5)]), "  -1.500");
        assert_eq!(fmt("%e", &[Const::Float(12345.678)]), "1.234568e+04");
        assert_eq!(fmt("%.2e", &[Const::Float(0.00123)]), "1.23e-03");
        assert_eq!(fmt("%g %g %g", &[Const::Float(100.0), Const::Float(0.5), Const::Float(1e-5)]), "100 0.5 1e-05");
        assert_eq!(fmt("%d", &[Const::Float(2.9)]), "2");
    }

    #[test]
    fn test_strings() {
        assert_eq!(fmt("[%s] [%6s] [%.2s]", &[
            Const::Str("hi".into()),
            Const::Str("pad".into()),
            Const::Str("cut".into()),
        ]), "[hi] [   pad] [cu]");
    }

    #[test]
    fn test_missing_argument_is_error() {
        assert!(matches!(printf("%d %d", &[Const::Int(1)]), Err(ExecError::Format { .. })));
        assert_eq!(fmt("100%", &[]), "100%");
        assert_eq!(fmt("%q", &[]), "%q");
    }

    #[test]
    fn test_print() {
        assert_eq!(print(&Const::Int(1)), "1\n");
        assert_eq!(print(&Const::Float(0.5)), "0.500000\n");
        assert_eq!(print(&Const::Str("x".into())), "x\n");
    }
}
