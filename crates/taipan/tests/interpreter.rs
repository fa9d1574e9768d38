//! End-to-end tests: run Python source, compare captured stdout
//! byte-for-byte with what the reference interpreter prints.

use pretty_assertions::assert_eq;
use taipan::run_capture;

/// Runs `source` and returns captured stdout, panicking on any exception.
fn stdout(source: &str) -> String {
    match run_capture(source) {
        Ok((_, output)) => output,
        Err(exception) => panic!("unexpected exception: {exception}\nsource:\n{source}"),
    }
}

/// Runs `source` expecting an uncaught exception; returns its display form.
fn error(source: &str) -> String {
    match run_capture(source) {
        Ok((value, output)) => panic!("expected exception, got {value:?} with output {output:?}"),
        Err(exception) => exception.to_string(),
    }
}

// ----------------------------------------------------------------------
// arithmetic and numerics
// ----------------------------------------------------------------------

#[test]
fn test_sum_range() {
    assert_eq!(stdout("print(sum(range(1, 11)))"), "55\n");
}

#[test]
fn test_int_float_distinction() {
    assert_eq!(stdout("print(1)\nprint(1.0)\nprint(1 == 1.0)"), "1\n1.0\nTrue\n");
    assert_eq!(stdout("print(7 / 2)\nprint(4 / 2)\nprint(7 // 2)"), "3.5\n2.0\n3\n");
}

#[test]
fn test_floor_division_and_modulo_signs() {
    assert_eq!(stdout("print(-7 // 2)\nprint(-7 % 3)\nprint(7 % -3)"), "-4\n2\n-2\n");
}

#[test]
fn test_arbitrary_precision_integers() {
    assert_eq!(stdout("print(2 ** 100)"), "1267650600228229401496703205376\n");
    assert_eq!(
        stdout("x = 10 ** 20\nprint(x + 1)"),
        "100000000000000000001\n"
    );
    assert_eq!(stdout("print(2 ** 100 // 2 ** 99)"), "2\n");
}

#[test]
fn test_pow_negative_exponent_returns_float() {
    assert_eq!(stdout("print(2 ** -1)"), "0.5\n");
}

#[test]
fn test_bool_is_an_int() {
    assert_eq!(stdout("print(True + True)\nprint(True * 1.0)"), "2\n1.0\n");
    assert_eq!(stdout("print(1 == 1.0 == True)"), "True\n");
}

#[test]
fn test_nan_semantics() {
    assert_eq!(
        stdout("nan = float('nan')\nprint(nan == nan)\nprint(nan in [nan])"),
        "False\nTrue\n"
    );
    assert_eq!(stdout("nan = float('nan')\nprint(nan < 1.0, nan > 1.0)"), "False False\n");
}

#[test]
fn test_numeric_keys_collapse_in_sets() {
    assert_eq!(stdout("print(len({1, True, 1.0}))"), "1\n");
}

#[test]
fn test_float_repr_shapes() {
    assert_eq!(stdout("print(0.1 + 0.2)"), "0.30000000000000004\n");
    assert_eq!(stdout("print(1e16)\nprint(1e-5)\nprint(1e15)"), "1e+16\n1e-05\n1000000000000000.0\n");
}

#[test]
fn test_division_by_zero() {
    assert_eq!(error("1 / 0"), "ZeroDivisionError: division by zero");
    assert_eq!(error("1 // 0"), "ZeroDivisionError: integer division or modulo by zero");
}

#[test]
fn test_abs_round_banker() {
    assert_eq!(stdout("print(round(0.5), round(1.5), round(2.5))"), "0 2 2\n");
    assert_eq!(stdout("print(abs(-3), abs(-2.5))"), "3 2.5\n");
}

// ----------------------------------------------------------------------
// functions, closures, recursion
// ----------------------------------------------------------------------

#[test]
fn test_recursive_fib() {
    let src = "def fib(n):\n    return n if n < 2 else fib(n-1) + fib(n-2)\nprint(fib(10))";
    assert_eq!(stdout(src), "55\n");
}

#[test]
fn test_closure_counter_with_nonlocal() {
    let src = "\
def counter():
    n = 0
    def inc():
        nonlocal n
        n += 1
        return n
    return inc
c = counter()
print(c())
print(c())
d = counter()
print(d())
";
    assert_eq!(stdout(src), "1\n2\n1\n");
}

#[test]
fn test_global_statement() {
    let src = "\
x = 0
def bump():
    global x
    x = x + 1
bump()
bump()
print(x)
";
    assert_eq!(stdout(src), "2\n");
}

#[test]
fn test_default_arguments_evaluated_once() {
    let src = "\
def f(a, b=[]):
    b.append(a)
    return b
print(f(1))
print(f(2))
";
    assert_eq!(stdout(src), "[1]\n[1, 2]\n");
}

#[test]
fn test_star_args_and_kwargs() {
    let src = "\
def f(a, *args, **kwargs):
    print(a)
    print(args)
    print(kwargs)
f(1, 2, 3, x=4)
";
    assert_eq!(stdout(src), "1\n(2, 3)\n{'x': 4}\n");
}

#[test]
fn test_keyword_arguments_and_defaults() {
    let src = "\
def greet(name, greeting='hello'):
    return greeting + ' ' + name
print(greet('ada'))
print(greet('ada', greeting='hi'))
print(greet(greeting='hey', name='bob'))
";
    assert_eq!(stdout(src), "hello ada\nhi ada\nhey bob\n");
}

#[test]
fn test_call_function_ex() {
    let src = "\
def f(a, b, c=0):
    return a + b + c
args = [1, 2]
print(f(*args))
kw = {'c': 10}
print(f(*args, **kw))
";
    assert_eq!(stdout(src), "3\n13\n");
}

#[test]
fn test_lambda_and_ternary() {
    assert_eq!(stdout("f = lambda a, b=2: a + b\nprint(f(1), f(1, 3))"), "3 4\n");
    assert_eq!(stdout("x = 5\nprint('big' if x > 3 else 'small')"), "big\n");
}

#[test]
fn test_decorators_apply_innermost_first() {
    let src = "\
def add_one(f):
    def wrapped():
        return f() + 1
    return wrapped
def double(f):
    def wrapped():
        return f() * 2
    return wrapped
@add_one
@double
def base():
    return 10
print(base())
";
    // double applies first, then add_one: 10 * 2 + 1.
    assert_eq!(stdout(src), "21\n");
}

#[test]
fn test_missing_argument_is_type_error() {
    let err = error("def f(a, b):\n    return a\nf(1)");
    assert_eq!(err, "TypeError: f() missing 1 required positional argument: 'b'");
}

#[test]
fn test_recursion_limit() {
    let err = error("def f():\n    return f()\nf()");
    assert_eq!(err, "RecursionError: maximum recursion depth exceeded");
}

// ----------------------------------------------------------------------
// aliasing and augmented assignment
// ----------------------------------------------------------------------

#[test]
fn test_list_aug_assign_mutates_aliases() {
    let src = "l1 = [1]; l2 = l1; l1 += [2]; print(l1 is l2); print(l2)";
    assert_eq!(stdout(src), "True\n[1, 2]\n");
}

#[test]
fn test_plain_add_does_not_alias() {
    let src = "l1 = [1]; l2 = l1; l1 = l1 + [2]; print(l1 is l2); print(l2)";
    assert_eq!(stdout(src), "False\n[1]\n");
}

#[test]
fn test_aug_assign_subscript_evaluates_once() {
    let src = "\
calls = []
def key():
    calls.append(1)
    return 0
d = [10]
d[key()] += 5
print(d, len(calls))
";
    assert_eq!(stdout(src), "[15] 1\n");
}

#[test]
fn test_aug_assign_attribute() {
    let src = "\
class Box:
    def __init__(self):
        self.n = 1
b = Box()
b.n += 41
print(b.n)
";
    assert_eq!(stdout(src), "42\n");
}

#[test]
fn test_immutable_aug_assign_rebinds() {
    let src = "t = (1,); u = t; t += (2,); print(t, u)";
    assert_eq!(stdout(src), "(1, 2) (1,)\n");
}

// ----------------------------------------------------------------------
// control flow
// ----------------------------------------------------------------------

#[test]
fn test_while_else_and_break() {
    let src = "\
n = 0
while n < 3:
    n += 1
else:
    print('else ran')
while True:
    break
else:
    print('not printed')
print('done')
";
    assert_eq!(stdout(src), "else ran\ndone\n");
}

#[test]
fn test_for_else_and_break_pops_iterator() {
    let src = "\
for i in range(3):
    if i == 1:
        break
else:
    print('no break')
for i in range(2):
    pass
else:
    print('completed')
";
    assert_eq!(stdout(src), "completed\n");
}

#[test]
fn test_continue() {
    let src = "\
out = []
for i in range(5):
    if i % 2 == 0:
        continue
    out.append(i)
print(out)
";
    assert_eq!(stdout(src), "[1, 3]\n");
}

#[test]
fn test_chained_comparison() {
    assert_eq!(stdout("print(1 < 2 < 3)\nprint(1 < 2 > 3)\nprint(3 > 2 > 1)"), "True\nFalse\nTrue\n");
    // The middle expression is evaluated exactly once.
    let src = "\
count = []
def mid():
    count.append(1)
    return 2
print(1 < mid() < 3, len(count))
";
    assert_eq!(stdout(src), "True 1\n");
}

#[test]
fn test_short_circuit() {
    let src = "\
def loud(x):
    print('eval', x)
    return x
print(loud(0) and loud(1))
print(loud(2) or loud(3))
";
    assert_eq!(stdout(src), "eval 0\n0\neval 2\n2\n");
}

#[test]
fn test_nested_loops() {
    let src = "\
for i in range(2):
    for j in range(2):
        print(i, j)
";
    assert_eq!(stdout(src), "0 0\n0 1\n1 0\n1 1\n");
}

// ----------------------------------------------------------------------
// generators
// ----------------------------------------------------------------------

#[test]
fn test_generator_squares() {
    let src = "def gen():\n    for i in range(3): yield i*i\nprint(list(gen()))";
    assert_eq!(stdout(src), "[0, 1, 4]\n");
}

#[test]
fn test_generator_is_lazy() {
    let src = "\
def gen():
    print('start')
    yield 1
    print('middle')
    yield 2
g = gen()
print('created')
print(next(g))
print(next(g))
";
    assert_eq!(stdout(src), "created\nstart\n1\nmiddle\n2\n");
}

#[test]
fn test_generator_exhaustion_raises_stop_iteration() {
    let src = "\
def gen():
    yield 1
g = gen()
next(g)
try:
    next(g)
except StopIteration:
    print('exhausted')
";
    assert_eq!(stdout(src), "exhausted\n");
}

#[test]
fn test_generator_send() {
    let src = "\
def echo():
    while True:
        got = yield 1
        print('got', got)
g = echo()
print(next(g))
print(g.send('x'))
";
    assert_eq!(stdout(src), "1\ngot x\n1\n");
}

#[test]
fn test_generator_throw_and_close() {
    let src = "\
def gen():
    try:
        yield 1
    except ValueError:
        yield 'caught'
g = gen()
print(next(g))
print(g.throw(ValueError('boom')))
def gen2():
    yield 1
    print('never')
h = gen2()
next(h)
h.close()
print('closed')
";
    assert_eq!(stdout(src), "1\ncaught\nclosed\n");
}

#[test]
fn test_for_loop_equivalent_to_iterator_protocol() {
    let src = "\
def gen():
    yield 'a'
    yield 'b'
for x in gen():
    print(x)
";
    assert_eq!(stdout(src), "a\nb\n");
}

#[test]
fn test_generator_expression() {
    assert_eq!(stdout("g = (x * 2 for x in range(3))\nprint(list(g))"), "[0, 2, 4]\n");
    assert_eq!(stdout("print(sum(x * x for x in range(4)))"), "14\n");
}

// ----------------------------------------------------------------------
// exceptions
// ----------------------------------------------------------------------

#[test]
fn test_except_finally_message() {
    let src = "\
try:
    raise ValueError(\"x\")
except ValueError as e:
    print(e.message)
finally:
    print(\"fin\")
";
    assert_eq!(stdout(src), "x\nfin\n");
}

#[test]
fn test_finally_runs_on_every_path() {
    let src = "\
def f(mode):
    try:
        if mode == 'raise':
            raise ValueError('v')
        if mode == 'return':
            return 'returned'
        print('normal body')
    except ValueError:
        print('caught')
    finally:
        print('finally', mode)
    return 'fell through'
print(f('normal'))
print(f('raise'))
print(f('return'))
";
    assert_eq!(
        stdout(src),
        "normal body\nfinally normal\nfell through\ncaught\nfinally raise\nfell through\nfinally return\nreturned\n"
    );
}

#[test]
fn test_else_runs_only_without_exception() {
    let src = "\
for should_raise in [False, True]:
    try:
        if should_raise:
            raise ValueError('v')
    except ValueError:
        print('handler')
    else:
        print('else')
";
    assert_eq!(stdout(src), "else\nhandler\n");
}

#[test]
fn test_exception_hierarchy_matching() {
    let src = "\
try:
    1 // 0
except ArithmeticError:
    print('arithmetic')
try:
    raise IndexError('i')
except LookupError:
    print('lookup')
try:
    raise ValueError('v')
except (TypeError, ValueError):
    print('tuple match')
";
    assert_eq!(stdout(src), "arithmetic\nlookup\ntuple match\n");
}

#[test]
fn test_unmatched_exception_propagates() {
    let src = "\
try:
    try:
        raise ValueError('inner')
    except TypeError:
        print('wrong handler')
except ValueError as e:
    print('outer caught', e.message)
";
    assert_eq!(stdout(src), "outer caught inner\n");
}

#[test]
fn test_bare_raise_reraises() {
    let src = "\
try:
    try:
        raise ValueError('original')
    except ValueError:
        print('first')
        raise
except ValueError as e:
    print('second', e.message)
";
    assert_eq!(stdout(src), "first\nsecond original\n");
}

#[test]
fn test_user_exception_class() {
    let src = "\
class MyError(Exception):
    pass
try:
    raise MyError('custom')
except MyError as e:
    print('caught', e.message)
try:
    raise MyError('again')
except Exception as e:
    print('as exception', e.message)
";
    assert_eq!(stdout(src), "caught custom\nas exception again\n");
}

#[test]
fn test_uncaught_exception_output() {
    assert_eq!(error("raise ValueError('boom')"), "ValueError: boom");
    assert_eq!(error("undefined_name"), "NameError: name 'undefined_name' is not defined");
    assert_eq!(
        error("def f():\n    print(x)\n    x = 1\nf()"),
        "UnboundLocalError: cannot access local variable 'x' where it is not associated with a value"
    );
}

#[test]
fn test_assert() {
    assert_eq!(stdout("assert True\nprint('ok')"), "ok\n");
    assert_eq!(error("assert False, 'nope'"), "AssertionError: nope");
    assert_eq!(error("assert 1 == 2"), "AssertionError");
}

#[test]
fn test_nested_finally_ordering() {
    let src = "\
try:
    try:
        raise ValueError('v')
    finally:
        print('inner finally')
except ValueError:
    print('handled')
finally:
    print('outer finally')
";
    assert_eq!(stdout(src), "inner finally\nhandled\nouter finally\n");
}

#[test]
fn test_return_through_nested_finally() {
    let src = "\
def f():
    try:
        try:
            return 'value'
        finally:
            print('inner')
    finally:
        print('outer')
print(f())
";
    assert_eq!(stdout(src), "inner\nouter\nvalue\n");
}

#[test]
fn test_break_through_finally() {
    let src = "\
for i in range(3):
    try:
        if i == 1:
            break
        print('body', i)
    finally:
        print('fin', i)
print('after')
";
    assert_eq!(stdout(src), "body 0\nfin 0\nfin 1\nafter\n");
}

// ----------------------------------------------------------------------
// pattern matching
// ----------------------------------------------------------------------

#[test]
fn test_match_sequence() {
    let src = "match [1,2]:\n    case [a, b]: print(a+b)\n    case _: print(\"no\")";
    assert_eq!(stdout(src), "3\n");
}

#[test]
fn test_match_values_captures_and_or() {
    let src = "\
def describe(x):
    match x:
        case 0:
            return 'zero'
        case 1 | 2:
            return 'small'
        case [a]:
            return 'one-elem'
        case [a, b] if a > b:
            return 'descending'
        case [a, b]:
            return 'pair'
        case other:
            return 'other'
print(describe(0))
print(describe(2))
print(describe([7]))
print(describe([9, 1]))
print(describe([1, 9]))
print(describe('hi'))
";
    assert_eq!(stdout(src), "zero\nsmall\none-elem\ndescending\npair\nother\n");
}

#[test]
fn test_match_guard_failure_falls_through() {
    let src = "\
match 5:
    case n if n > 10:
        print('big')
    case n:
        print('got', n)
";
    assert_eq!(stdout(src), "got 5\n");
}

#[test]
fn test_match_tuple_subject() {
    let src = "\
match (1, 2):
    case [a, b]:
        print('seq', a, b)
";
    assert_eq!(stdout(src), "seq 1 2\n");
}

#[test]
fn test_match_exact_length_required() {
    let src = "\
match [1, 2, 3]:
    case [a, b]:
        print('two')
    case [a, b, c]:
        print('three')
";
    assert_eq!(stdout(src), "three\n");
}

// ----------------------------------------------------------------------
// classes
// ----------------------------------------------------------------------

#[test]
fn test_class_init_and_methods() {
    let src = "\
class Point:
    def __init__(self, x, y):
        self.x = x
        self.y = y
    def mag2(self):
        return self.x * self.x + self.y * self.y
p = Point(3, 4)
print(p.x, p.y)
print(p.mag2())
";
    assert_eq!(stdout(src), "3 4\n25\n");
}

#[test]
fn test_inheritance_and_mro() {
    let src = "\
class A:
    def name(self):
        return 'A'
    def shared(self):
        return 'A-shared'
class B:
    def name(self):
        return 'B'
    def only_b(self):
        return 'B-only'
class C(A, B):
    pass
c = C()
print(c.name())
print(c.shared())
print(c.only_b())
";
    // Left-to-right depth-first: A wins for name.
    assert_eq!(stdout(src), "A\nA-shared\nB-only\n");
}

#[test]
fn test_class_attributes_and_instance_shadowing() {
    let src = "\
class Cfg:
    limit = 10
a = Cfg()
b = Cfg()
print(a.limit)
a.limit = 99
print(a.limit, b.limit, Cfg.limit)
";
    assert_eq!(stdout(src), "10\n99 10 10\n");
}

#[test]
fn test_isinstance_with_classes() {
    let src = "\
class Animal:
    pass
class Dog(Animal):
    pass
d = Dog()
print(isinstance(d, Dog), isinstance(d, Animal), isinstance(3, Animal))
print(isinstance(True, int), isinstance(1, bool))
";
    assert_eq!(stdout(src), "True True False\nTrue False\n");
}

#[test]
fn test_str_dunder_used_by_print() {
    let src = "\
class Tag:
    def __init__(self, name):
        self.name = name
    def __str__(self):
        return 'tag:' + self.name
print(Tag('x'))
";
    assert_eq!(stdout(src), "tag:x\n");
}

#[test]
fn test_bound_method_as_value() {
    let src = "\
class Greeter:
    def __init__(self, name):
        self.name = name
    def greet(self):
        return 'hi ' + self.name
g = Greeter('z')
m = g.greet
print(m())
";
    assert_eq!(stdout(src), "hi z\n");
}

// ----------------------------------------------------------------------
// containers and methods
// ----------------------------------------------------------------------

#[test]
fn test_list_methods() {
    let src = "\
l = [3, 1]
l.append(2)
l.extend([1, 1])
print(l, l.count(1), l.index(2))
l.sort()
print(l)
l.reverse()
print(l)
print(l.pop(), l)
l.insert(0, 9)
l.remove(9)
print(l)
";
    assert_eq!(
        stdout(src),
        "[3, 1, 2, 1, 1] 3 2\n[1, 1, 1, 2, 3]\n[3, 2, 1, 1, 1]\n1 [3, 2, 1, 1]\n[3, 2, 1, 1]\n"
    );
}

#[test]
fn test_sort_with_key_and_reverse() {
    let src = "\
words = ['bb', 'a', 'ccc']
words.sort(key=len)
print(words)
words.sort(key=len, reverse=True)
print(words)
print(sorted([3, 1, 2]))
print(sorted(['bb', 'a'], key=len))
";
    assert_eq!(stdout(src), "['a', 'bb', 'ccc']\n['ccc', 'bb', 'a']\n[1, 2, 3]\n['a', 'bb']\n");
}

#[test]
fn test_dict_methods_and_ordering() {
    let src = "\
d = {'b': 1, 'a': 2}
d['c'] = 3
print(d)
print(list(d.keys()), list(d.values()))
print(d.get('a'), d.get('zz'), d.get('zz', 0))
print('a' in d, 'zz' in d)
for k, v in d.items():
    print(k, v)
print(d.pop('a'), d)
d.setdefault('x', 9)
print(d['x'])
";
    assert_eq!(
        stdout(src),
        "{'b': 1, 'a': 2, 'c': 3}\n['b', 'a', 'c'] [1, 2, 3]\n2 None 0\nTrue False\nb 1\na 2\nc 3\n1 {'b': 1, 'c': 3}\n9\n"
    );
}

#[test]
fn test_set_methods_and_operators() {
    let src = "\
a = {1, 2, 3}
b = {3, 4}
print(sorted(a | b))
print(sorted(a & b))
print(sorted(a - b))
print(sorted(a ^ b))
a.add(5)
a.discard(99)
print(sorted(a))
print(a.issuperset({1, 2}))
";
    assert_eq!(stdout(src), "[1, 2, 3, 4]\n[3]\n[1, 2]\n[1, 2, 4, 5]\n[1, 2, 3, 5]\nTrue\n");
}

#[test]
fn test_string_methods() {
    let src = "\
s = '  Hello World  '
print(s.strip())
print(s.strip().upper())
print(s.strip().lower())
print('a,b,c'.split(','))
print('one two  three'.split())
print('-'.join(['a', 'b', 'c']))
print('hello'.replace('l', 'L'))
print('hello'.startswith('he'), 'hello'.endswith('lo'))
print('banana'.count('an'), 'banana'.find('na'))
print('42'.isdigit(), 'ab'.isalpha(), '4a'.isdigit())
";
    assert_eq!(
        stdout(src),
        "Hello World\nHELLO WORLD\nhello world\n['a', 'b', 'c']\n['one', 'two', 'three']\na-b-c\nheLLo\nTrue True\n2 2\nTrue True False\n"
    );
}

#[test]
fn test_str_format() {
    let src = "\
print('{} and {}'.format(1, 2))
print('{1} then {0}'.format('a', 'b'))
print('{name}={value}'.format(name='k', value=3))
";
    assert_eq!(stdout(src), "1 and 2\nb then a\nk=3\n");
}

#[test]
fn test_percent_format() {
    assert_eq!(
        stdout("print('%s is %d%%' % ('x', 50))\nprint('%f' % 1.5)\nprint('%o' % 8)"),
        "x is 50%\n1.500000\n10\n"
    );
}

#[test]
fn test_slicing() {
    let src = "\
l = [0, 1, 2, 3, 4]
print(l[1:3], l[:2], l[3:], l[::2], l[::-1])
print(l[-2:], l[10:20])
s = 'hello'
print(s[1:4], s[::-1], s[-3:])
t = (0, 1, 2)
print(t[1:])
";
    assert_eq!(
        stdout(src),
        "[1, 2] [0, 1] [3, 4] [0, 2, 4] [4, 3, 2, 1, 0]\n[3, 4] []\nell olleh llo\n(1, 2)\n"
    );
}

#[test]
fn test_slice_step_zero_is_value_error() {
    assert_eq!(error("[1, 2][::0]"), "ValueError: slice step cannot be zero");
}

#[test]
fn test_negative_indexing() {
    assert_eq!(stdout("l = [1, 2, 3]\nprint(l[-1], 'abc'[-1])"), "3 c\n");
    assert_eq!(error("[1, 2][5]"), "IndexError: list index out of range");
}

#[test]
fn test_unpacking() {
    let src = "\
a, b = 1, 2
print(a, b)
a, b = b, a
print(a, b)
x, *rest, y = [1, 2, 3, 4, 5]
print(x, rest, y)
first, *tail = 'ab'
print(first, tail)
";
    assert_eq!(stdout(src), "1 2\n2 1\n1 [2, 3, 4] 5\na ['b']\n");
}

#[test]
fn test_unpack_arity_errors() {
    assert_eq!(
        error("a, b = [1, 2, 3]"),
        "ValueError: too many values to unpack (expected 2)"
    );
    assert_eq!(
        error("a, b, c = [1]"),
        "ValueError: not enough values to unpack (expected 3, got 1)"
    );
}

#[test]
fn test_key_error() {
    assert_eq!(error("d = {'a': 1}\nd['b']"), "KeyError: 'b'");
}

// ----------------------------------------------------------------------
// builtins
// ----------------------------------------------------------------------

#[test]
fn test_print_sep_end() {
    assert_eq!(stdout("print(1, 2, 3, sep='-', end='!')\nprint()"), "1-2-3!\n");
    assert_eq!(stdout("print('a', 'b')"), "a b\n");
}

#[test]
fn test_len() {
    assert_eq!(
        stdout("print(len('abc'), len([1]), len((1, 2)), len({'a': 1}), len({1, 2, 3}), len(range(5)))"),
        "3 1 2 1 3 5\n"
    );
}

#[test]
fn test_enumerate_zip_map_filter() {
    let src = "\
for i, c in enumerate('ab'):
    print(i, c)
for i, c in enumerate('ab', 1):
    print(i, c)
print(list(zip([1, 2, 3], 'ab')))
print(list(map(lambda x: x * 2, [1, 2])))
print(list(map(lambda a, b: a + b, [1, 2], [10, 20])))
print(list(filter(lambda x: x % 2, range(5))))
print(list(filter(None, [0, 1, '', 'a'])))
";
    assert_eq!(
        stdout(src),
        "0 a\n1 b\n1 a\n2 b\n[(1, 'a'), (2, 'b')]\n[2, 4]\n[11, 22]\n[1, 3]\n[1, 'a']\n"
    );
}

#[test]
fn test_reversed_min_max_sum() {
    let src = "\
print(list(reversed([1, 2, 3])))
print(list(reversed('abc')))
print(min(3, 1, 2), max([3, 1, 2]))
print(min(['bb', 'a'], key=len))
print(sum([1, 2, 3]), sum([1, 2], 10))
";
    assert_eq!(stdout(src), "[3, 2, 1]\n['c', 'b', 'a']\n1 3\na\n6 13\n");
}

#[test]
fn test_constructors() {
    let src = "\
print(list('ab'), list(range(3)), list())
print(tuple([1, 2]), tuple())
print(dict([('a', 1)]), dict(x=2))
print(set([1, 1, 2]) == {1, 2})
print(str(42), str(1.5), str(None))
print(int('42'), int(3.9), int(-3.9), int(True))
print(float('2.5'), float(3))
print(bool(0), bool(''), bool([1]))
";
    assert_eq!(
        stdout(src),
        "['a', 'b'] [0, 1, 2] []\n(1, 2) ()\n{'a': 1} {'x': 2}\nTrue\n42 1.5 None\n42 3 -3 1\n2.5 3.0\nFalse False True\n"
    );
}

#[test]
fn test_int_parse_errors() {
    assert_eq!(
        error("int('4.5')"),
        "ValueError: invalid literal for int() with base 10: '4.5'"
    );
}

#[test]
fn test_type_builtin() {
    let src = "\
print(type(1))
print(type('x'))
print(type(1) == int, type(1.0) == float, type(True) == bool)
class Foo:
    pass
print(type(Foo()) == Foo)
";
    assert_eq!(stdout(src), "<class 'int'>\n<class 'str'>\nTrue True True\nTrue\n");
}

#[test]
fn test_range_behavior() {
    let src = "\
print(list(range(3)), list(range(1, 4)), list(range(10, 0, -3)))
r = range(2, 10, 2)
print(r.start, r.stop, r.step, len(r), r[1], r[-1])
print(4 in r, 5 in r)
print(range(0, 3) == range(3))
";
    assert_eq!(stdout(src), "[0, 1, 2] [1, 2, 3] [10, 7, 4, 1]\n2 10 2 4 4 8\nTrue False\nTrue\n");
}

// ----------------------------------------------------------------------
// comprehensions
// ----------------------------------------------------------------------

#[test]
fn test_comprehensions() {
    let src = "\
print([x * x for x in range(4)])
print([x for x in range(10) if x % 3 == 0])
print([(x, y) for x in range(2) for y in range(2)])
print({x % 3 for x in range(6)} == {0, 1, 2})
print({c: ord_ for ord_, c in enumerate('ab')})
";
    assert_eq!(
        stdout(src),
        "[0, 1, 4, 9]\n[0, 3, 6, 9]\n[(0, 0), (0, 1), (1, 0), (1, 1)]\nTrue\n{'a': 0, 'b': 1}\n"
    );
}

#[test]
fn test_comprehension_scoping() {
    let src = "\
x = 'outer'
result = [x for x in range(3)]
print(result)
print(x)
n = 10
print([x + n for x in range(2)])
";
    // The comprehension variable does not leak into the defining scope.
    assert_eq!(stdout(src), "[0, 1, 2]\nouter\n[10, 11]\n");
}

#[test]
fn test_nested_comprehension_over_closure() {
    let src = "\
def scale(factor):
    return [i * factor for i in range(3)]
print(scale(10))
";
    assert_eq!(stdout(src), "[0, 10, 20]\n");
}

// ----------------------------------------------------------------------
// f-strings
// ----------------------------------------------------------------------

#[test]
fn test_fstrings() {
    let src = "\
x = 42
name = 'world'
print(f'hello {name}')
print(f'{x} + 1 = {x + 1}')
print(f'{x!r} and {name!r}')
print(f'{x:5}|{x:<5}|{x:^6}|')
print(f'{3.14159:.2f}')
print(f'{{literal}}')
";
    assert_eq!(
        stdout(src),
        "hello world\n42 + 1 = 43\n42 and 'world'\n   42|42   |  42  |\n3.14\n{literal}\n"
    );
}

#[test]
fn test_adjacent_string_concatenation() {
    assert_eq!(stdout("print('ab' 'cd')\nx = 1\nprint(f'{x}' '!')"), "abcd\n1!\n");
}

// ----------------------------------------------------------------------
// with statement
// ----------------------------------------------------------------------

#[test]
fn test_with_enter_exit_order() {
    let src = "\
class CM:
    def __init__(self, name):
        self.name = name
    def __enter__(self):
        print('enter', self.name)
        return self.name
    def __exit__(self, t, v, tb):
        print('exit', self.name)
        return False
with CM('a') as x:
    print('body', x)
with CM('o'), CM('i'):
    print('nested body')
";
    assert_eq!(
        stdout(src),
        "enter a\nbody a\nexit a\nenter o\nenter i\nnested body\nexit i\nexit o\n"
    );
}

#[test]
fn test_with_exit_runs_on_exception_and_suppression() {
    let src = "\
class Suppress:
    def __enter__(self):
        return self
    def __exit__(self, t, v, tb):
        print('exit saw', v.message)
        return True
with Suppress():
    raise ValueError('inside')
print('continued')
";
    assert_eq!(stdout(src), "exit saw inside\ncontinued\n");
}

#[test]
fn test_with_propagates_when_not_suppressed() {
    let src = "\
class Loud:
    def __enter__(self):
        return self
    def __exit__(self, t, v, tb):
        print('exit ran')
        return False
try:
    with Loud():
        raise ValueError('boom')
except ValueError as e:
    print('caught', e.message)
";
    assert_eq!(stdout(src), "exit ran\ncaught boom\n");
}

#[test]
fn test_with_exit_on_return_path() {
    let src = "\
class Noisy:
    def __enter__(self):
        return self
    def __exit__(self, t, v, tb):
        print('exit')
        return False
def f():
    with Noisy():
        return 'r'
print(f())
";
    assert_eq!(stdout(src), "exit\nr\n");
}

// ----------------------------------------------------------------------
// scoping details
// ----------------------------------------------------------------------

#[test]
fn test_class_scope_not_visible_to_methods() {
    let src = "\
x = 'module'
class C:
    x = 'class'
    def get(self):
        return x
print(C().get())
print(C.x)
";
    assert_eq!(stdout(src), "module\nclass\n");
}

#[test]
fn test_del_name() {
    let src = "\
x = 1
del x
try:
    print(x)
except NameError:
    print('gone')
";
    assert_eq!(stdout(src), "gone\n");
}

#[test]
fn test_del_subscript_and_attribute() {
    let src = "\
l = [1, 2, 3]
del l[1]
print(l)
d = {'a': 1, 'b': 2}
del d['a']
print(d)
class Box:
    pass
b = Box()
b.v = 1
del b.v
try:
    print(b.v)
except AttributeError:
    print('no attr')
";
    assert_eq!(stdout(src), "[1, 3]\n{'b': 2}\nno attr\n");
}

#[test]
fn test_multiple_assignment_targets() {
    assert_eq!(stdout("a = b = [0]\na.append(1)\nprint(b)"), "[0, 1]\n");
}

// ----------------------------------------------------------------------
// async surface syntax
// ----------------------------------------------------------------------

#[test]
fn test_async_def_runs_synchronously() {
    let src = "\
async def f():
    return 41
async def g():
    return await f() + 1
print(g())
";
    assert_eq!(stdout(src), "42\n");
}
